//! Error taxonomy shared by the store, tools, router, and conductor.
//!
//! Tools never raise across the router boundary; the router never raises
//! across the conductor boundary. Every variant here is meant to become
//! a `{"error": "..."}` JSON value at some boundary rather than unwind.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    ExternalTool(String),

    #[error("{0}")]
    Llm(String),

    #[error("Cancelled.")]
    Cancelled,

    #[error("database unavailable")]
    TransientDb,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type HiveResult<T> = Result<T, HiveError>;

impl HiveError {
    /// Render as the `{"error": "..."}` shape every tool result collapses to.
    pub fn as_json(&self) -> Value {
        serde_json::json!({ "error": self.to_string() })
    }
}
