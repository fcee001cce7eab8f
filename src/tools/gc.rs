//! `gc` tool (C11). Grounded on `hive/tools/gc.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::bio;
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct GcInput {
    sequence: String,
}

pub struct GcTool;

impl Tool for GcTool {
    fn name(&self) -> &'static str { "gc" }
    fn description(&self) -> &'static str { "Compute base composition and GC%/AT% for a sequence." }
    fn widget(&self) -> &'static str { "gc" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "sequence"] }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "sequence": { "type": "string", "description": "Nucleotide sequence" } },
            "required": ["sequence"]
        })
    }

    fn format_result(&self, result: &Value) -> String {
        match result.get("gc_percent").and_then(|v| v.as_f64()) {
            Some(pct) => format!("GC {pct:.1}%"),
            None => "Error.".to_string(),
        }
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: GcInput = serde_json::from_value(params)?;
            let comp = bio::gc_content(&input.sequence);
            Ok(json!({
                "a": comp.a, "c": comp.c, "g": comp.g, "t": comp.t,
                "gc_percent": comp.gc_percent, "at_percent": comp.at_percent,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gc_and_at_percent_sum_to_100() {
        let tool = GcTool;
        let result = tool.execute(json!({"sequence": "ATGCGGCC"}), "direct").await.unwrap();
        let gc = result["gc_percent"].as_f64().unwrap();
        let at = result["at_percent"].as_f64().unwrap();
        assert!((gc + at - 100.0).abs() < 1e-6);
    }
}
