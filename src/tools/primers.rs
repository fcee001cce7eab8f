//! `primers` tool (C11). Grounded on `hive/tools/primers.py`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::HiveError;
use crate::store::Store;
use crate::tools::resolve::{resolve_sequence, ResolveOptions};
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct PrimersInput {
    sid: Option<i64>,
    name: Option<String>,
    primer_name: Option<String>,
}

pub struct PrimersTool {
    store: Store,
}

impl PrimersTool {
    pub fn new(store: Store) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

impl Tool for PrimersTool {
    fn name(&self) -> &'static str { "primers" }
    fn description(&self) -> &'static str { "List the primers associated with a sequence." }
    fn widget(&self) -> &'static str { "primers" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "info"] }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sid": { "type": "integer" },
                "name": { "type": "string" },
                "primer_name": { "type": "string" }
            }
        })
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: PrimersInput = serde_json::from_value(params)?;
            if input.sid.is_none() && input.name.is_none() {
                return Err(HiveError::Validation("Provide either sid or name".into()).into());
            }
            let resolved = resolve_sequence(
                &self.store,
                input.sid,
                input.name.as_deref(),
                ResolveOptions { load_primers: true, ..Default::default() },
            )
            .await?;
            let Some(resolved) = resolved else {
                return Err(HiveError::NotFound("Sequence not found".into()).into());
            };

            let primers: Vec<Value> = resolved
                .primers
                .into_iter()
                .filter(|p| input.primer_name.as_deref().map_or(true, |n| p.name.eq_ignore_ascii_case(n)))
                .map(|p| {
                    json!({
                        "name": p.name, "sequence": p.sequence, "tm": p.tm,
                        "start": p.start, "end": p.end,
                        "strand": p.strand.map(|s| s.as_i8()),
                    })
                })
                .collect();

            Ok(json!({ "primers": primers, "total": primers.len() }))
        })
    }
}
