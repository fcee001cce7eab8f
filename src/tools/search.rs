//! `search` tool (C11). Grounded on `hive/tools/search.py`: parse the
//! boolean query, apply optional filters, delegate to the store's fuzzy
//! + boolean search and return ranked hits.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::{parse_bool_query, SearchFilters, Store};
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct SearchInput {
    query: String,
    tags: Option<String>,
    topology: Option<String>,
    size_min: Option<i64>,
    size_max: Option<i64>,
    #[serde(rename = "type")]
    feature_type: Option<String>,
}

pub struct SearchTool {
    store: Store,
}

impl SearchTool {
    pub fn new(store: Store) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self { store })
    }
}

impl Tool for SearchTool {
    fn name(&self) -> &'static str { "search" }
    fn description(&self) -> &'static str {
        "Fuzzy/boolean search over the sequence library. Combine terms with && (AND) or || (OR)."
    }
    fn widget(&self) -> &'static str { "search" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "info"] }

    fn guidelines(&self) -> Option<&'static str> {
        Some(
            "Search by name, description, feature, or tag. Use && / || to combine terms. \
             Filter with topology, size_min, size_max, type.",
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "tags": { "type": "string" },
                "topology": { "type": "string", "enum": ["circular", "linear"] },
                "size_min": { "type": "integer" },
                "size_max": { "type": "integer" },
                "type": { "type": "string", "description": "Restrict to sequences carrying this feature type" }
            },
            "required": ["query"]
        })
    }

    fn format_result(&self, result: &Value) -> String {
        match result.get("total").and_then(|v| v.as_u64()) {
            Some(n) => format!("{n} result(s)."),
            None => "Search failed.".to_string(),
        }
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: SearchInput = serde_json::from_value(params)?;
            let (terms, mode) = parse_bool_query(&input.query);
            let filters = SearchFilters {
                topology: input.topology,
                size_min: input.size_min,
                size_max: input.size_max,
                feature_type: input.feature_type,
            };
            let results = self.store.search(terms, mode, input.tags, filters).await?;
            Ok(json!({
                "results": results,
                "total": results.len(),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileStatus, ParseResult};
    use chrono::Utc;

    #[tokio::test]
    async fn finds_sequence_by_name_fragment() {
        let store = Store::open_in_memory().unwrap();
        let file_id = store
            .upsert_file("/lib/pkan.fa".into(), "h1".into(), "fasta".into(), FileStatus::Active, None, 4, Utc::now())
            .await
            .unwrap();
        let parsed = ParseResult {
            name: "pKanamycin".into(),
            sequence: "ATGC".into(),
            size_bp: 4,
            topology: "circular".into(),
            description: None,
            features: vec![],
            primers: vec![],
            meta: serde_json::Value::Null,
        };
        store.replace_sequence(file_id, parsed, vec![], "DNA").await.unwrap();

        let tool = SearchTool { store };
        let result = tool.execute(json!({"query": "kanamycin"}), "direct").await.unwrap();
        assert_eq!(result["total"], 1);
    }

    async fn seed(store: &Store, name: &str, topology: &str, size_bp: i64) {
        let file_id = store
            .upsert_file(format!("/lib/{name}.fa"), format!("hash-{name}"), "fasta".into(), FileStatus::Active, None, size_bp, Utc::now())
            .await
            .unwrap();
        let parsed = ParseResult {
            name: name.to_string(),
            sequence: "A".repeat(size_bp as usize),
            size_bp,
            topology: topology.to_string(),
            description: None,
            features: vec![],
            primers: vec![],
            meta: serde_json::Value::Null,
        };
        store.replace_sequence(file_id, parsed, vec![], "DNA").await.unwrap();
    }

    #[tokio::test]
    async fn boolean_and_query_narrows_to_the_matching_plasmid() {
        let store = Store::open_in_memory().unwrap();
        seed(&store, "pUC19", "circular", 2686).await;
        seed(&store, "pET28a", "circular", 5369).await;
        seed(&store, "pKanLinear", "linear", 4000).await;

        let tool = SearchTool { store };
        let result = tool.execute(json!({"query": "pKan && linear"}), "direct").await.unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "pKanLinear");
    }
}
