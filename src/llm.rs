//! LLM client (C12). Grounded on `hive/llm/client.py`: one client per
//! configured model, an OpenAI-compatible `chat()` contract regardless of
//! provider, a cheap `health()` probe, and a 120s request timeout. The
//! original delegates provider fan-out to `litellm`; no such crate exists
//! in this stack, so this talks the OpenAI-compatible `/chat/completions`
//! surface directly via `reqwest` (the pattern `cursor_usage.rs` used for
//! its own outbound HTTP calls) — which both Ollama and OpenAI-shaped
//! providers expose.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ModelEntry;
use crate::error::{HiveError, HiveResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
}

fn default_finish_reason() -> String { "stop".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ChatResponse {
    pub fn is_refusal(&self) -> bool {
        self.choices.first().map(|c| c.finish_reason == "refusal").unwrap_or(false)
    }
}

/// Async client for one configured model. Talks an OpenAI-compatible
/// `/chat/completions` endpoint; provider quirks (Ollama's bare base URL,
/// the presence of an API key) are normalized in [`Self::chat`].
pub struct LlmClient {
    http: reqwest::Client,
    entry: ModelEntry,
}

impl LlmClient {
    pub fn new(entry: ModelEntry) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client build should not fail with static config");
        Self { http, entry }
    }

    pub fn model_id(&self) -> String {
        self.entry.id()
    }

    pub fn provider(&self) -> &str {
        &self.entry.provider
    }

    pub fn model(&self) -> &str {
        &self.entry.model
    }

    fn base_url(&self) -> String {
        let base = self
            .entry
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        base.trim_end_matches('/').to_string()
    }

    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<Value>>,
        tool_choice: Option<&str>,
    ) -> HiveResult<ChatResponse> {
        let mut body = serde_json::json!({
            "model": self.entry.model,
            "messages": messages,
        });
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = Value::Array(tools);
                if let Some(choice) = tool_choice {
                    body["tool_choice"] = Value::String(choice.to_string());
                }
            }
        }

        let url = format!("{}/chat/completions", self.base_url());
        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.entry.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| HiveError::Llm(format!("request to {url} failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HiveError::Llm(format!("{status}: {text}")));
        }

        resp.json::<ChatResponse>()
            .await
            .map_err(|e| HiveError::Llm(format!("invalid response from {url}: {e}")))
    }

    /// Reachability probe (`spec.md` §4.10): Ollama is healthy when its
    /// `/api/tags` endpoint responds; cloud providers are treated as
    /// healthy whenever an API key is configured (matching the original's
    /// no-network-call shortcut for hosted providers).
    pub async fn health(&self) -> bool {
        if self.entry.provider == "ollama" {
            let root = self.base_url();
            let root = root.strip_suffix("/v1").unwrap_or(&root);
            let url = format!("{root}/api/tags");
            let client = match reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build() {
                Ok(c) => c,
                Err(_) => return false,
            };
            client.get(&url).send().await.map(|r| r.status().is_success()).unwrap_or(false)
        } else {
            self.entry.api_key.is_some()
        }
    }
}

/// Pool of configured models, addressed by [`ModelEntry::id`].
pub struct LlmPool {
    clients: std::collections::HashMap<String, std::sync::Arc<LlmClient>>,
}

impl LlmPool {
    pub fn new(entries: Vec<ModelEntry>) -> Self {
        let clients = entries
            .into_iter()
            .map(|e| (e.id(), std::sync::Arc::new(LlmClient::new(e))))
            .collect();
        Self { clients }
    }

    pub fn get(&self, model_id: &str) -> Option<std::sync::Arc<LlmClient>> {
        self.clients.get(model_id).cloned()
    }

    pub fn default_client(&self) -> Option<std::sync::Arc<LlmClient>> {
        self.clients.values().next().cloned()
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    /// Client-facing model metadata for the `init` message
    /// (`spec.md` §6): `{id, provider, model}` per configured entry.
    pub fn describe_models(&self) -> Vec<serde_json::Value> {
        self.clients
            .values()
            .map(|c| serde_json::json!({ "id": c.model_id(), "provider": c.provider(), "model": c.model() }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_finish_reason_is_detected() {
        let resp = ChatResponse {
            choices: vec![ChatChoice {
                message: ChatMessage { role: "assistant".into(), content: None, tool_calls: None, tool_call_id: None, name: None },
                finish_reason: "refusal".into(),
            }],
            usage: TokenUsage::default(),
        };
        assert!(resp.is_refusal());
    }

    #[test]
    fn stop_finish_reason_is_not_a_refusal() {
        let resp = ChatResponse {
            choices: vec![ChatChoice {
                message: ChatMessage { role: "assistant".into(), content: Some("hi".into()), tool_calls: None, tool_call_id: None, name: None },
                finish_reason: "stop".into(),
            }],
            usage: TokenUsage::default(),
        };
        assert!(!resp.is_refusal());
    }

    #[test]
    fn pool_resolves_by_model_id() {
        let pool = LlmPool::new(vec![ModelEntry {
            provider: "ollama".into(),
            model: "llama3".into(),
            base_url: Some("http://localhost:11434/v1".into()),
            api_key: None,
        }]);
        assert!(pool.get("ollama/llama3").is_some());
        assert!(pool.get("nope/nope").is_none());
    }
}
