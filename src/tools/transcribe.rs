//! `transcribe` tool (C11). Grounded on `hive/tools/transcribe.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::bio;
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct TranscribeInput {
    sequence: String,
}

pub struct TranscribeTool;

impl Tool for TranscribeTool {
    fn name(&self) -> &'static str { "transcribe" }
    fn description(&self) -> &'static str { "Transcribe a DNA sequence into RNA." }
    fn widget(&self) -> &'static str { "text" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "sequence"] }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "sequence": { "type": "string", "description": "DNA sequence" } },
            "required": ["sequence"]
        })
    }

    fn format_result(&self, result: &Value) -> String {
        result.get("sequence").and_then(|v| v.as_str()).unwrap_or("").to_string()
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: TranscribeInput = serde_json::from_value(params)?;
            let rna = bio::transcribe(&input.sequence);
            Ok(json!({ "sequence": rna, "length": rna.len() }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replaces_t_with_u() {
        let tool = TranscribeTool;
        let result = tool.execute(json!({"sequence": "ATGC"}), "direct").await.unwrap();
        assert_eq!(result["sequence"], "AUGC");
    }
}
