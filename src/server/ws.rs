//! `/ws` client channel (C14/C15). Grounded on `hive/server/websocket.py`:
//! a `ConnectionManager` tracks active sockets and their single in-flight
//! router task; each connection owns one [`Conductor`] and speaks the
//! message kinds of `spec.md` §6.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::conductor::Conductor;
use crate::models::ProgressEvent;

use super::http::quick_status;
use super::AppState;

/// Registered so a `cancel` message can abort the right in-flight task.
#[derive(Default)]
struct ConnectionManager {
    cancel_senders: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl ConnectionManager {
    fn register(&self, conn_id: &str, sender: watch::Sender<bool>) {
        self.cancel_senders.lock().expect("connection manager mutex poisoned").insert(conn_id.to_string(), sender);
    }

    fn cancel(&self, conn_id: &str) {
        if let Some(sender) = self.cancel_senders.lock().expect("connection manager mutex poisoned").get(conn_id) {
            let _ = sender.send(true);
        }
    }

    fn unregister(&self, conn_id: &str) {
        self.cancel_senders.lock().expect("connection manager mutex poisoned").remove(conn_id);
    }
}

static MANAGER: std::sync::OnceLock<ConnectionManager> = std::sync::OnceLock::new();

fn manager() -> &'static ConnectionManager {
    MANAGER.get_or_init(ConnectionManager::default)
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();

    // Forward everything queued on out_tx to the socket, serialized.
    let forward_task = tokio::spawn(async move {
        while let Some(value) = out_rx.recv().await {
            if sender.send(Message::Text(value.to_string())).await.is_err() {
                break;
            }
        }
    });

    let user = match state.store.get_or_create_default_user().await {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(error = %e, "could not resolve the default user");
            let _ = out_tx.send(serde_json::json!({ "type": "message", "content": "Server not ready." }));
            drop(out_tx);
            let _ = forward_task.await;
            return;
        }
    };

    let default_model = state.llm_pool.default_client().map(|c| c.model_id());
    let preferred_model = user.preferences.get("model_id").and_then(|v| v.as_str()).map(|s| s.to_string());
    let model = preferred_model.filter(|m| state.llm_pool.get(m).is_some()).or(default_model);

    let mut conductor = Conductor::new(state.config.clone(), model.clone());

    let init_status = quick_status(&state).await;
    let _ = out_tx.send(serde_json::json!({
        "type": "init",
        "config": {
            "max_history_pairs": state.config.chat.max_history_pairs,
        },
        "tools": state.registry.metadata(),
        "status": init_status,
        "models": state.llm_pool.describe_models(),
        "currentModel": model,
        "user": { "id": user.id, "username": user.username, "slug": user.slug, "preferences": user.preferences },
    }));

    tracing::info!(conn_id = %conn_id, "client connected");

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let data: Value = match serde_json::from_str(&msg) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let kind = data.get("type").and_then(|v| v.as_str()).unwrap_or("");

        match kind {
            "cancel" => {
                manager().cancel(&conn_id);
            }
            "set_model" => {
                if let Some(model_id) = data.get("modelId").and_then(|v| v.as_str()) {
                    if state.llm_pool.get(model_id).is_some() {
                        conductor.model = Some(model_id.to_string());
                        let _ = out_tx.send(serde_json::json!({ "type": "model_changed", "modelId": model_id }));
                        if let Err(e) = state.store.update_preference(user.id, "model_id".into(), Value::String(model_id.to_string())).await {
                            tracing::warn!(error = %e, "model preference save failed");
                        }
                    }
                }
            }
            "set_preference" => {
                let key = data.get("key").and_then(|v| v.as_str());
                if let Some(key) = key {
                    let value = data.get("value").cloned().unwrap_or(Value::Null);
                    match state.store.update_preference(user.id, key.to_string(), value).await {
                        Ok(preferences) => {
                            let _ = out_tx.send(serde_json::json!({ "type": "preferences_updated", "preferences": preferences }));
                        }
                        Err(e) => tracing::warn!(error = %e, "preference update failed"),
                    }
                }
            }
            "submit_feedback" => {
                let rating = data.get("rating").and_then(|v| v.as_str()).unwrap_or("");
                if rating == "good" || rating == "bad" {
                    let priority = data.get("priority").and_then(|v| v.as_i64()).unwrap_or(3);
                    let comment = data.get("comment").and_then(|v| v.as_str()).unwrap_or("").to_string();
                    let chat_id = conductor.chat_id().map(|s| s.to_string());
                    match state.store.create_feedback(user.id, chat_id, rating.to_string(), priority, comment).await {
                        Ok(()) => { let _ = out_tx.send(serde_json::json!({ "type": "feedback_saved" })); }
                        Err(e) => tracing::warn!(error = %e, "feedback save failed"),
                    }
                }
            }
            "load_chat" => {
                if let Some(chat_id) = data.get("chatId").and_then(|v| v.as_str()) {
                    if let Some(saved) = conductor.load_chat(chat_id) {
                        let _ = out_tx.send(serde_json::json!({
                            "type": "chat_loaded",
                            "chatId": saved.id,
                            "messages": saved.messages,
                            "title": saved.title,
                            "model": conductor.model,
                        }));
                    }
                }
            }
            "rerun_tool" => {
                let Some(tool) = data.get("tool").and_then(|v| v.as_str()) else { continue };
                let params = data.get("params").cloned().unwrap_or(serde_json::json!({}));
                let message_index = data.get("messageIndex").and_then(|v| v.as_u64()).map(|i| i as usize);
                let result = conductor.rerun_tool(&state.registry, tool, params, message_index).await;
                let _ = out_tx.send(serde_json::json!({
                    "type": "widget_data",
                    "messageIndex": message_index,
                    "data": result,
                }));
            }
            _ => {
                let content = data.get("content").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
                if content.is_empty() {
                    continue;
                }
                run_turn(&conn_id, &state, &mut conductor, content, &out_tx).await;
            }
        }
    }

    manager().unregister(&conn_id);
    drop(out_tx);
    let _ = forward_task.await;
    tracing::info!(conn_id = %conn_id, "client disconnected");
}

/// One user turn: bounded by its own cancel channel, registered with the
/// connection manager for the duration of the turn only (mirrors the
/// original's "one task at a time per connection" invariant).
async fn run_turn(conn_id: &str, state: &AppState, conductor: &mut Conductor, content: String, out_tx: &mpsc::UnboundedSender<Value>) {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    manager().register(conn_id, cancel_tx);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let progress_out = out_tx.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            let _ = progress_out.send(serde_json::json!({ "type": "progress", "event": event }));
        }
    });

    let llm = conductor.model.as_deref().and_then(|id| state.llm_pool.get(id));
    let outcome = conductor
        .process_message(&content, &state.registry, llm.as_deref(), &progress_tx, &cancel_rx)
        .await;
    drop(progress_tx);
    let _ = progress_task.await;

    match outcome {
        Ok(outcome) => {
            if outcome.cancelled {
                let _ = out_tx.send(serde_json::json!({ "type": "message", "content": outcome.content }));
            } else {
                let mut response = serde_json::json!({
                    "type": "message",
                    "content": outcome.content,
                    "model": outcome.model,
                });
                if let Some(widget) = outcome.widget {
                    response["widget"] = widget;
                }
                let _ = out_tx.send(response);

                if outcome.status_changed {
                    let _ = out_tx.send(serde_json::json!({ "type": "status_update", "status": quick_status(state).await }));
                }
                if let Some((chat_id, title)) = outcome.chat_saved {
                    let _ = out_tx.send(serde_json::json!({ "type": "chat_saved", "chatId": chat_id, "title": title }));
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "message processing failed");
            let _ = out_tx.send(serde_json::json!({ "type": "message", "content": "Something went wrong. Check server logs for details." }));
        }
    }

    manager().unregister(conn_id);
}
