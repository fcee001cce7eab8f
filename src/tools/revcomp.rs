//! `revcomp` tool (C11). Grounded on `hive/tools/revcomp.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::bio;
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct RevcompInput {
    sequence: String,
}

pub struct RevcompTool;

impl Tool for RevcompTool {
    fn name(&self) -> &'static str { "revcomp" }
    fn description(&self) -> &'static str { "Reverse-complement a nucleotide sequence." }
    fn widget(&self) -> &'static str { "text" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "sequence"] }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "sequence": { "type": "string", "description": "Nucleotide sequence" } },
            "required": ["sequence"]
        })
    }

    fn format_result(&self, result: &Value) -> String {
        result.get("sequence").and_then(|v| v.as_str()).unwrap_or("").to_string()
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: RevcompInput = serde_json::from_value(params)?;
            let revcomp = bio::reverse_complement(&input.sequence);
            Ok(json!({ "sequence": revcomp, "length": revcomp.len() }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reverses_and_complements() {
        let tool = RevcompTool;
        let result = tool.execute(json!({"sequence": "ATGC"}), "direct").await.unwrap();
        assert_eq!(result["sequence"], "GCAT");
    }
}
