//! `features` tool (C11). Grounded on `hive/tools/features.py`: resolve
//! the parent sequence then list its features, ordered by start.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::HiveError;
use crate::store::Store;
use crate::tools::resolve::{resolve_sequence, ResolveOptions};
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct FeaturesInput {
    sid: Option<i64>,
    name: Option<String>,
    #[serde(rename = "type")]
    feature_type: Option<String>,
}

pub struct FeaturesTool {
    store: Store,
}

impl FeaturesTool {
    pub fn new(store: Store) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

impl Tool for FeaturesTool {
    fn name(&self) -> &'static str { "features" }
    fn description(&self) -> &'static str { "List the annotated features of a sequence." }
    fn widget(&self) -> &'static str { "features" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "info"] }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sid": { "type": "integer" },
                "name": { "type": "string" },
                "type": { "type": "string" }
            }
        })
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: FeaturesInput = serde_json::from_value(params)?;
            if input.sid.is_none() && input.name.is_none() {
                return Err(HiveError::Validation("Provide either sid or name".into()).into());
            }
            let resolved = resolve_sequence(
                &self.store,
                input.sid,
                input.name.as_deref(),
                ResolveOptions { load_features: true, ..Default::default() },
            )
            .await?;
            let Some(resolved) = resolved else {
                return Err(HiveError::NotFound(format!(
                    "Sequence not found: {:?}",
                    input.sid.map(|s| s.to_string()).or(input.name)
                ))
                .into());
            };

            let features: Vec<Value> = resolved
                .features
                .into_iter()
                .filter(|f| input.feature_type.as_deref().map_or(true, |t| f.feature_type == t))
                .map(|f| {
                    json!({
                        "name": f.name, "type": f.feature_type,
                        "start": f.start, "end": f.end,
                        "strand": f.strand.as_i8(), "qualifiers": f.qualifiers,
                    })
                })
                .collect();

            Ok(json!({ "features": features, "total": features.len() }))
        })
    }
}
