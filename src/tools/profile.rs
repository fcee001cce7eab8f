//! `profile` tool (C11). Grounded on `hive/tools/profile.py`: full
//! sequence + features + primers + file assembly in one call.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{display_file_path, Config};
use crate::error::HiveError;
use crate::store::Store;
use crate::tools::resolve::{resolve_sequence, ResolveOptions};
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct ProfileInput {
    sid: Option<i64>,
    name: Option<String>,
}

pub struct ProfileTool {
    store: Store,
    config: Arc<Config>,
}

impl ProfileTool {
    pub fn new(store: Store, config: Arc<Config>) -> Arc<Self> {
        Arc::new(Self { store, config })
    }
}

impl Tool for ProfileTool {
    fn name(&self) -> &'static str { "profile" }
    fn description(&self) -> &'static str {
        "Show full details of a specific sequence: metadata, features, primers, file info."
    }
    fn widget(&self) -> &'static str { "profile" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "info"] }

    fn guidelines(&self) -> Option<&'static str> {
        Some("Full sequence details. Use sid (from search results) or name.")
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sid": { "type": "integer", "description": "Sequence ID (preferred)" },
                "name": { "type": "string", "description": "Sequence name (fallback)" }
            }
        })
    }

    fn format_result(&self, result: &Value) -> String {
        match result.get("sequence") {
            Some(seq) if !seq.is_null() => format!(
                "{} — {} bp, {}",
                seq["name"].as_str().unwrap_or(""),
                seq["size_bp"],
                seq["topology"].as_str().unwrap_or(""),
            ),
            _ => "Sequence not found.".to_string(),
        }
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: ProfileInput = serde_json::from_value(params)?;
            if input.sid.is_none() && input.name.is_none() {
                return Err(HiveError::Validation("Provide either sid or name".into()).into());
            }

            let resolved = resolve_sequence(
                &self.store,
                input.sid,
                input.name.as_deref(),
                ResolveOptions { load_features: true, load_primers: true, load_file: true },
            )
            .await?;
            let Some(resolved) = resolved else {
                let selector = input.sid.map(|s| s.to_string()).unwrap_or_default();
                let selector = if selector.is_empty() { input.name.unwrap_or_default() } else { selector };
                return Err(HiveError::NotFound(format!("Sequence not found: {selector}")).into());
            };

            let seq = &resolved.sequence;
            let file_json = resolved.file.as_ref().map(|f| {
                json!({
                    "path": display_file_path(&self.config, std::path::Path::new(&f.file_path)),
                    "format": f.format,
                    "size": f.file_size,
                    "indexed_at": f.indexed_at.to_rfc3339(),
                })
            });

            Ok(json!({
                "sequence": {
                    "sid": seq.id, "name": seq.name, "size_bp": seq.size_bp,
                    "topology": seq.topology.as_str(), "description": seq.description,
                    "meta": seq.meta, "sequence_data": seq.sequence,
                },
                "features": resolved.features.into_iter().map(|f| json!({
                    "name": f.name, "type": f.feature_type, "start": f.start,
                    "end": f.end, "strand": f.strand.as_i8(), "qualifiers": f.qualifiers,
                })).collect::<Vec<_>>(),
                "primers": resolved.primers.into_iter().map(|p| json!({
                    "name": p.name, "sequence": p.sequence, "tm": p.tm,
                    "start": p.start, "end": p.end, "strand": p.strand.map(|s| s.as_i8()),
                })).collect::<Vec<_>>(),
                "file": file_json,
            }))
        })
    }
}
