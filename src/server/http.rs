//! Plain HTTP edges (C15/`SPEC_FULL.md` §4.14): liveness and status,
//! the same status shape the conductor pushes as `status_update` over
//! the socket, grounded on `hive/server/websocket.py::_quick_status`.

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use super::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(quick_status(&state).await)
}

/// Lightweight status snapshot: index counts plus a cheap LLM reachability
/// probe. No tool executes to produce this.
pub async fn quick_status(state: &AppState) -> Value {
    let (db_connected, indexed_files, sequences, features, users, last_updated) =
        match state.store.counts().await {
            Ok((files, sequences, features, users)) => {
                let last = state.store.last_indexed_at().await.ok().flatten();
                (true, files, sequences, features, users, last.map(|d| d.to_rfc3339()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "status query failed");
                (false, 0, 0, 0, 0, None)
            }
        };

    let llm_available = match state.llm_pool.default_client() {
        Some(client) => client.health().await,
        None => false,
    };

    serde_json::json!({
        "indexed_files": indexed_files,
        "sequences": sequences,
        "features": features,
        "users": users,
        "tools": state.registry.all().len(),
        "db_connected": db_connected,
        "llm_available": llm_available,
        "last_updated": last_updated,
    })
}
