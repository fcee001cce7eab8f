//! Per-session conductor (C14). Grounded on `hive/server/websocket.py`'s
//! `ConnectionManager` + `_handle_message`: one conductor per client
//! channel, owning a rolling chat history, the single in-flight router
//! task, and the autosave/title/widget-stripping bookkeeping around it.
//! `server/ws.rs` owns the socket and the task handle; this module owns
//! everything that doesn't need the socket to decide.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::error::HiveResult;
use crate::llm::{ChatMessage, LlmClient};
use crate::models::ProgressEvent;
use crate::router::{self, RouterResponse};
use crate::tools::ToolRegistry;

/// One message as persisted to a chat file — richer than the plain
/// `{role, content}` pairs kept in the LLM-facing rolling history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub role: String,
    pub content: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<Value>,
}

/// On-disk shape of one saved chat (`SPEC_FULL.md` §9's inferred
/// `chat_storage` format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedChat {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatRecord>,
}

/// Flat-file chat persistence: one `<id>.json` per chat under
/// `config.chats_dir()`. No index or DB table — chats are addressed
/// only by the id the client already holds.
#[derive(Clone)]
pub struct ChatStorage {
    dir: PathBuf,
}

impl ChatStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn new_chat_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn load(&self, id: &str) -> Option<SavedChat> {
        let text = std::fs::read_to_string(self.path(id)).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn save(&self, id: &str, messages: &[ChatRecord], model: Option<&str>, title: Option<&str>) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let existing = self.load(id);
        let created = existing.as_ref().map(|c| c.created.clone()).unwrap_or_else(now_iso);
        let title = title.map(|t| t.to_string()).or_else(|| existing.and_then(|c| c.title));
        let saved = SavedChat {
            id: id.to_string(),
            title,
            created,
            model: model.map(|m| m.to_string()),
            messages: messages.to_vec(),
        };
        std::fs::write(self.path(id), serde_json::to_string_pretty(&saved)?)
    }

    pub fn update_title(&self, id: &str, title: &str) -> std::io::Result<()> {
        if let Some(mut chat) = self.load(id) {
            chat.title = Some(title.to_string());
            std::fs::write(self.path(id), serde_json::to_string_pretty(&chat)?)?;
        }
        Ok(())
    }
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// What the caller (`server/ws.rs`) should push down the socket after
/// [`Conductor::process_message`] returns.
pub struct MessageOutcome {
    pub content: String,
    pub model: Option<String>,
    pub widget: Option<Value>,
    /// Counts/health changed (a tool ran) — caller should push a fresh
    /// `status_update`.
    pub status_changed: bool,
    /// A chat title was generated this turn.
    pub chat_saved: Option<(String, String)>,
    pub cancelled: bool,
}

/// Owns one client channel's rolling history and saved-chat bookkeeping.
/// Not `Send`-constrained beyond what `Store`/`LlmClient` already are, so
/// one instance lives inside each connection task in `server/ws.rs`.
pub struct Conductor {
    config: Arc<Config>,
    storage: ChatStorage,
    history: Vec<ChatMessage>,
    chat_id: Option<String>,
    messages: Vec<ChatRecord>,
    title_generated: bool,
    pub model: Option<String>,
}

impl Conductor {
    pub fn new(config: Arc<Config>, model: Option<String>) -> Self {
        let storage = ChatStorage::new(config.chats_dir());
        Self {
            config,
            storage,
            history: Vec::new(),
            chat_id: None,
            messages: Vec::new(),
            title_generated: false,
            model,
        }
    }

    fn append_history(&mut self, role: &str, content: &str) {
        self.history.push(ChatMessage {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        });
        let max_msgs = self.config.chat.max_history_pairs * 2;
        if self.history.len() > max_msgs {
            let drop = self.history.len() - max_msgs;
            self.history.drain(0..drop);
        }
    }

    fn count_user_messages(&self) -> usize {
        self.messages.iter().filter(|m| m.role == "user").count()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatRecord] {
        &self.messages
    }

    /// Replace the session's live state with a previously saved chat
    /// (`load_chat`, `spec.md` §6). Returns it so the caller can forward
    /// it to the client verbatim.
    pub fn load_chat(&mut self, id: &str) -> Option<SavedChat> {
        let saved = self.storage.load(id)?;
        self.chat_id = Some(id.to_string());
        self.messages = saved.messages.clone();
        self.title_generated = saved.title.is_some();
        self.history = self
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.clone(),
                content: Some(m.content.clone()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            })
            .collect();
        self.model = saved.model.clone();
        Some(saved)
    }

    /// Route one user message through the agentic loop and update chat
    /// state (`hive/server/websocket.py::_handle_message`).
    #[allow(clippy::too_many_arguments)]
    pub async fn process_message(
        &mut self,
        content: &str,
        registry: &ToolRegistry,
        llm: Option<&LlmClient>,
        progress: &mpsc::UnboundedSender<ProgressEvent>,
        cancel: &watch::Receiver<bool>,
    ) -> HiveResult<MessageOutcome> {
        let response = router::dispatch(content, &self.history, registry, llm, &self.config.llm, progress, cancel).await?;

        if matches!(response, RouterResponse::Cancelled) {
            return Ok(MessageOutcome {
                content: "Cancelled.".to_string(),
                model: self.model.clone(),
                widget: None,
                status_changed: false,
                chat_saved: None,
                cancelled: true,
            });
        }

        // Forms are ephemeral UI, not conversation turns; don't persist them.
        if let RouterResponse::Form { tool, schema } = response {
            return Ok(MessageOutcome {
                content: String::new(),
                model: self.model.clone(),
                widget: Some(serde_json::json!({ "type": "form", "tool": tool, "params": {}, "data": schema })),
                status_changed: false,
                chat_saved: None,
                cancelled: false,
            });
        }

        self.append_history("user", content);
        self.messages.push(ChatRecord { role: "user".into(), content: content.to_string(), ts: now_iso(), model: None, widget: None });

        let (assistant_content, widget, status_changed) = match response {
            RouterResponse::Message { text, .. } => (text, None, false),
            RouterResponse::ToolResult { tool, data, content, chain, .. } => {
                let widget_type = registry.get(&tool).map(|t| t.widget().to_string()).unwrap_or_else(|| "text".to_string());
                let mut widget = serde_json::json!({
                    "type": widget_type,
                    "tool": tool,
                    "params": {},
                    "data": data,
                });
                if !chain.is_empty() {
                    widget["chain"] = serde_json::to_value(&chain).unwrap_or(Value::Null);
                }
                (content, Some(widget), true)
            }
            RouterResponse::Form { .. } | RouterResponse::Cancelled => unreachable!("handled above"),
        };

        if !assistant_content.is_empty() {
            self.append_history("assistant", &assistant_content);
        }
        self.messages.push(ChatRecord {
            role: "assistant".into(),
            content: assistant_content.clone(),
            ts: now_iso(),
            model: self.model.clone(),
            widget: widget.clone(),
        });

        let chat_saved = self.maybe_autosave(llm).await;

        Ok(MessageOutcome { content: assistant_content, model: self.model.clone(), widget, status_changed, chat_saved, cancelled: false })
    }

    /// Re-run a tool directly (`rerun_tool`, for a stale stripped widget)
    /// and patch the matching chat message's widget in place.
    pub async fn rerun_tool(&mut self, registry: &ToolRegistry, tool: &str, params: Value, message_index: Option<usize>) -> Value {
        let data = registry.execute(tool, params, "rerun").await;
        if let Some(idx) = message_index {
            if let Some(msg) = self.messages.get_mut(idx) {
                if let Some(widget) = msg.widget.as_mut() {
                    widget["data"] = data.clone();
                    if let Some(obj) = widget.as_object_mut() {
                        obj.remove("stale");
                    }
                }
            }
        }
        data
    }

    /// Autosave after `chat.auto_save_after` user turns (`spec.md` §6),
    /// stripping oversized widget payloads, and generate a title once.
    async fn maybe_autosave(&mut self, llm: Option<&LlmClient>) -> Option<(String, String)> {
        if self.count_user_messages() < self.config.chat.auto_save_after {
            return None;
        }
        if self.chat_id.is_none() {
            self.chat_id = Some(ChatStorage::new_chat_id());
        }
        let chat_id = self.chat_id.clone().unwrap();
        let threshold = self.config.chat.widget_data_threshold;
        let to_save: Vec<ChatRecord> = self.messages.iter().map(|m| strip_large_widget(m, threshold)).collect();
        let _ = self.storage.save(&chat_id, &to_save, self.model.as_deref(), None);

        if !self.title_generated {
            if let Some(llm) = llm {
                self.title_generated = true;
                if let Some(title) = generate_chat_title(llm, &self.messages[..self.messages.len().min(4)]).await {
                    let _ = self.storage.update_title(&chat_id, &title);
                    return Some((chat_id, title));
                }
            }
        }
        None
    }

}

fn strip_large_widget(msg: &ChatRecord, threshold: usize) -> ChatRecord {
    let Some(widget) = &msg.widget else { return msg.clone() };
    if widget.get("type").and_then(|v| v.as_str()) == Some("form") {
        return msg.clone();
    }
    let Some(data) = widget.get("data") else { return msg.clone() };
    let size = serde_json::to_string(data).map(|s| s.len()).unwrap_or(0);
    if size <= threshold {
        return msg.clone();
    }
    let mut stripped = msg.clone();
    let mut w = serde_json::json!({
        "type": widget.get("type").cloned().unwrap_or(Value::String("text".into())),
        "tool": widget.get("tool").cloned().unwrap_or(Value::Null),
        "params": widget.get("params").cloned().unwrap_or(serde_json::json!({})),
        "stale": true,
    });
    if let Some(chain) = widget.get("chain") {
        w["chain"] = chain.clone();
    }
    stripped.widget = Some(w);
    stripped
}

async fn generate_chat_title(llm: &LlmClient, messages: &[ChatRecord]) -> Option<String> {
    let summary: String = messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content.chars().take(200).collect::<String>()))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = ChatMessage {
        role: "system".into(),
        content: Some("Generate a 2-word title for this chat. Reply with ONLY the title, no quotes, no punctuation.".into()),
        tool_calls: None,
        tool_call_id: None,
        name: None,
    };
    let user = ChatMessage { role: "user".into(), content: Some(summary), tool_calls: None, tool_call_id: None, name: None };
    let resp = llm.chat(vec![prompt, user], None, None).await.ok()?;
    let title = resp.choices.first()?.message.content.clone()?;
    let title = title.trim().trim_matches(|c| c == '"' || c == '\'');
    if title.is_empty() {
        return None;
    }
    Some(title.split_whitespace().take(2).collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_storage_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ChatStorage::new(dir.path().to_path_buf());
        let id = ChatStorage::new_chat_id();
        let msgs = vec![ChatRecord { role: "user".into(), content: "hi".into(), ts: now_iso(), model: None, widget: None }];
        storage.save(&id, &msgs, Some("ollama/llama3"), None).unwrap();

        let loaded = storage.load(&id).unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.model.as_deref(), Some("ollama/llama3"));
    }

    #[test]
    fn update_title_persists_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ChatStorage::new(dir.path().to_path_buf());
        let id = ChatStorage::new_chat_id();
        storage.save(&id, &[], None, None).unwrap();
        storage.update_title(&id, "Plasmid Search").unwrap();
        assert_eq!(storage.load(&id).unwrap().title.as_deref(), Some("Plasmid Search"));
    }

    #[test]
    fn large_widget_data_is_stripped_and_marked_stale() {
        let big = serde_json::json!({ "blob": "x".repeat(4096) });
        let msg = ChatRecord {
            role: "assistant".into(),
            content: "here".into(),
            ts: now_iso(),
            model: None,
            widget: Some(serde_json::json!({ "type": "search", "tool": "search", "params": {}, "data": big })),
        };
        let stripped = strip_large_widget(&msg, 2048);
        let widget = stripped.widget.unwrap();
        assert_eq!(widget["stale"], true);
        assert!(widget.get("data").is_none());
    }

    #[test]
    fn small_widget_data_is_kept_as_is() {
        let msg = ChatRecord {
            role: "assistant".into(),
            content: "here".into(),
            ts: now_iso(),
            model: None,
            widget: Some(serde_json::json!({ "type": "gc", "tool": "gc", "params": {}, "data": {"gc": 0.5} })),
        };
        let kept = strip_large_widget(&msg, 2048);
        assert!(kept.widget.unwrap().get("data").is_some());
    }

    #[test]
    fn form_widgets_are_never_stripped() {
        let big = serde_json::json!({ "blob": "x".repeat(4096) });
        let msg = ChatRecord {
            role: "assistant".into(),
            content: String::new(),
            ts: now_iso(),
            model: None,
            widget: Some(serde_json::json!({ "type": "form", "tool": "blast", "params": {}, "data": big })),
        };
        let kept = strip_large_widget(&msg, 2048);
        assert!(kept.widget.unwrap().get("data").is_some());
    }
}
