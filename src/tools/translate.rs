//! `translate` tool (C11). Grounded on `hive/tools/translate.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::bio;
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct TranslateInput {
    sequence: String,
    #[serde(default = "default_table")]
    table: u8,
}

fn default_table() -> u8 {
    1
}

pub struct TranslateTool;

impl Tool for TranslateTool {
    fn name(&self) -> &'static str { "translate" }
    fn description(&self) -> &'static str { "Translate a nucleotide sequence into protein." }
    fn widget(&self) -> &'static str { "text" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "sequence"] }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sequence": { "type": "string", "description": "Nucleotide sequence" },
                "table": { "type": "integer", "description": "NCBI codon table", "default": 1 }
            },
            "required": ["sequence"]
        })
    }

    fn format_result(&self, result: &Value) -> String {
        result.get("protein").and_then(|v| v.as_str()).unwrap_or("").to_string()
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: TranslateInput = serde_json::from_value(params)?;
            let protein = bio::translate(&input.sequence, input.table);
            let complete = bio::translation_is_complete(&protein);
            Ok(json!({ "protein": protein, "length": protein.len(), "complete": complete }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn translates_and_flags_completeness() {
        let tool = TranslateTool;
        let result = tool.execute(json!({"sequence": "ATGGGTTAA"}), "direct").await.unwrap();
        assert_eq!(result["protein"], "MG*");
        assert_eq!(result["complete"], true);
    }
}
