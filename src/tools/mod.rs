//! Tool base + registry (C7). Grounded on `hive/tools/base.py`: every
//! tool execution is wrapped so a panic or error never escapes as an
//! exception — the caller always gets back a JSON value, `{"error": ...}`
//! on failure.

pub mod schema;
pub mod summary;

pub mod blast;
pub mod digest;
pub mod extract;
pub mod factory;
pub mod features;
pub mod gc;
pub mod primers;
pub mod profile;
pub mod quarantine;
pub mod resolve;
pub mod revcomp;
pub mod search;
pub mod transcribe;
pub mod translate;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::error;

pub const TAG_LLM: &str = "llm";
pub const TAG_HIDDEN: &str = "hidden";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A typed tool: JSON-schema contract, free-form result, uniform failure
/// containment applied by the registry rather than by each tool.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn widget(&self) -> &'static str;
    fn tags(&self) -> &'static [&'static str];

    /// LLM-visible description, when richer than `description()`.
    fn guidelines(&self) -> Option<&'static str> {
        None
    }

    fn input_schema(&self) -> Value;

    fn execute<'a>(&'a self, params: Value, mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>>;

    /// Short human string for direct-mode UI.
    fn format_result(&self, result: &Value) -> String {
        if let Some(err) = result.get("error").and_then(|v| v.as_str()) {
            format!("Error: {err}")
        } else {
            "Done.".to_string()
        }
    }

    fn is_llm_tool(&self) -> bool {
        self.tags().contains(&TAG_LLM)
    }

    fn is_hidden(&self) -> bool {
        self.tags().contains(&TAG_HIDDEN)
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Register a tool, overriding any existing entry of the same name
    /// (external tools are allowed to shadow internal ones, per C8, with
    /// a warning left to the caller).
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    pub fn llm_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().filter(|t| t.is_llm_tool()).cloned().collect()
    }

    pub fn visible_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().filter(|t| !t.is_hidden()).cloned().collect()
    }

    /// UI-bootstrap metadata: everything the client needs without calling
    /// any tool.
    pub fn metadata(&self) -> Vec<Value> {
        self.visible_tools()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "widget": t.widget(),
                    "tags": t.tags(),
                })
            })
            .collect()
    }

    /// Execute a tool with uniform failure containment: any error or
    /// panic becomes `{"error": "Tool '<name>' failed. Check server logs."}`.
    pub async fn execute(&self, name: &str, params: Value, mode: &str) -> Value {
        let Some(tool) = self.get(name) else {
            return serde_json::json!({ "error": format!("Unknown tool '{name}'") });
        };

        let fut = AssertUnwindSafe(tool.execute(params, mode)).catch_unwind();
        match fut.await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                error!(tool = name, error = %e, "tool execution failed");
                serde_json::json!({ "error": format!("Tool '{name}' failed. Check server logs.") })
            }
            Err(_) => {
                error!(tool = name, "tool panicked");
                serde_json::json!({ "error": format!("Tool '{name}' failed. Check server logs.") })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;
    impl Tool for EchoTool {
        fn name(&self) -> &'static str { "echo" }
        fn description(&self) -> &'static str { "echoes input" }
        fn widget(&self) -> &'static str { "text" }
        fn tags(&self) -> &'static [&'static str] { &["llm", "test"] }
        fn input_schema(&self) -> Value { serde_json::json!({"type": "object"}) }
        fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
            Box::pin(async move { Ok(params) })
        }
    }

    struct PanicTool;
    impl Tool for PanicTool {
        fn name(&self) -> &'static str { "boom" }
        fn description(&self) -> &'static str { "panics" }
        fn widget(&self) -> &'static str { "text" }
        fn tags(&self) -> &'static [&'static str] { &["llm"] }
        fn input_schema(&self) -> Value { serde_json::json!({"type": "object"}) }
        fn execute<'a>(&'a self, _params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
            Box::pin(async move { panic!("boom") })
        }
    }

    #[tokio::test]
    async fn registry_executes_and_looks_up() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let result = reg.execute("echo", serde_json::json!({"x": 1}), "direct").await;
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_value_not_a_panic() {
        let reg = ToolRegistry::new();
        let result = reg.execute("nope", serde_json::json!({}), "direct").await;
        assert!(result.get("error").is_some());
    }

    #[tokio::test]
    async fn panicking_tool_is_contained() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(PanicTool));
        let result = reg.execute("boom", serde_json::json!({}), "direct").await;
        assert!(result.get("error").unwrap().as_str().unwrap().contains("boom"));
    }
}
