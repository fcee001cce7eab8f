//! `extract` tool (C11). Grounded on `hive/tools/extract.py`: pull a
//! subsequence by explicit coordinates, a region string, or by matching
//! a feature/primer name (exact match preferred, then longest fuzzy
//! match), honoring circular wraparound and strand.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::bio;
use crate::error::HiveError;
use crate::models::{Feature, Primer, Strand};
use crate::store::{fuzzy, Store};
use crate::tools::resolve::{resolve_sequence, ResolveOptions};
use crate::tools::{BoxFuture, Tool};

#[derive(Deserialize)]
struct ExtractInput {
    sid: Option<i64>,
    name: Option<String>,
    start: Option<i64>,
    end: Option<i64>,
    region: Option<String>,
    feature: Option<String>,
    primer: Option<String>,
    #[serde(default)]
    strand: Option<i8>,
}

/// Parse a 1-based inclusive region string ("100-200") into a 0-based
/// half-open `(start, end)` pair.
fn parse_region(region: &str) -> anyhow::Result<(i64, i64)> {
    let (lo, hi) = region
        .split_once('-')
        .ok_or_else(|| HiveError::Validation(format!("invalid region: {region}")))?;
    let start: i64 = lo.trim().parse().map_err(|_| HiveError::Validation(format!("invalid region: {region}")))?;
    let end: i64 = hi.trim().parse().map_err(|_| HiveError::Validation(format!("invalid region: {region}")))?;
    Ok((start - 1, end))
}

/// Longest span, in bp, a feature/primer selector of `(start, end)` covers
/// — used to break ties among equally-good fuzzy name matches.
fn span_len(start: i64, end: i64, seq_len: i64) -> i64 {
    if end >= start {
        end - start
    } else {
        (seq_len - start) + end
    }
}

fn best_feature_match<'a>(features: &'a [Feature], query: &str, seq_len: i64) -> Option<&'a Feature> {
    if let Some(exact) = features.iter().filter(|f| f.name.eq_ignore_ascii_case(query)).max_by_key(|f| span_len(f.start, f.end, seq_len)) {
        return Some(exact);
    }
    features
        .iter()
        .map(|f| (f, fuzzy::similarity(query, &f.name)))
        .filter(|(_, score)| *score >= fuzzy::SIMILARITY_FLOOR)
        .max_by(|(fa, sa), (fb, sb)| {
            sa.partial_cmp(sb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| span_len(fa.start, fa.end, seq_len).cmp(&span_len(fb.start, fb.end, seq_len)))
        })
        .map(|(f, _)| f)
}

fn best_primer_match<'a>(primers: &'a [Primer], query: &str) -> Option<&'a Primer> {
    if let Some(exact) = primers.iter().find(|p| p.name.eq_ignore_ascii_case(query)) {
        return Some(exact);
    }
    primers
        .iter()
        .map(|p| (p, fuzzy::similarity(query, &p.name)))
        .filter(|(_, score)| *score >= fuzzy::SIMILARITY_FLOOR)
        .max_by(|(_, sa), (_, sb)| sa.partial_cmp(sb).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(p, _)| p)
}

pub struct ExtractTool {
    store: Store,
}

impl ExtractTool {
    pub fn new(store: Store) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

impl Tool for ExtractTool {
    fn name(&self) -> &'static str { "extract" }
    fn description(&self) -> &'static str {
        "Extract a subsequence by coordinates, a region string, or by feature/primer name."
    }
    fn widget(&self) -> &'static str { "text" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "sequence"] }

    fn guidelines(&self) -> Option<&'static str> {
        Some(
            "Select exactly one of: region (\"100-200\", 1-based inclusive), \
             start/end (0-based, exclusive end), feature name, or primer name. \
             strand: -1 reverse-complements the result.",
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sid": { "type": "integer" },
                "name": { "type": "string" },
                "start": { "type": "integer" },
                "end": { "type": "integer" },
                "region": { "type": "string", "description": "1-based inclusive, e.g. 100-200" },
                "feature": { "type": "string" },
                "primer": { "type": "string" },
                "strand": { "type": "integer", "enum": [1, -1] }
            }
        })
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: ExtractInput = serde_json::from_value(params)?;
            if input.sid.is_none() && input.name.is_none() {
                return Err(HiveError::Validation("Provide either sid or name".into()).into());
            }

            let resolved = resolve_sequence(
                &self.store,
                input.sid,
                input.name.as_deref(),
                ResolveOptions { load_features: true, load_primers: true, ..Default::default() },
            )
            .await?;
            let Some(resolved) = resolved else {
                return Err(HiveError::NotFound("Sequence not found".into()).into());
            };

            let seq = &resolved.sequence;
            let seq_len = seq.size_bp;
            let circular = seq.topology.as_str() == "circular";

            let (start, end, mut strand, source): (i64, i64, i8, &'static str) =
                if let Some(feature_query) = &input.feature {
                    let f = best_feature_match(&resolved.features, feature_query, seq_len)
                        .ok_or_else(|| HiveError::NotFound(format!("No feature matching '{feature_query}'")))?;
                    (f.start, f.end, f.strand.as_i8(), "feature")
                } else if let Some(primer_query) = &input.primer {
                    let p = best_primer_match(&resolved.primers, primer_query)
                        .ok_or_else(|| HiveError::NotFound(format!("No primer matching '{primer_query}'")))?;
                    let (s, e) = (p.start.unwrap_or(0), p.end.unwrap_or(seq_len));
                    (s, e, p.strand.map(|s| s.as_i8()).unwrap_or(1), "primer")
                } else if let Some(region) = &input.region {
                    let (s, e) = parse_region(region)?;
                    (s, e, 1, "region")
                } else if let (Some(s), Some(e)) = (input.start, input.end) {
                    (s, e, 1, "coordinates")
                } else {
                    return Err(HiveError::Validation(
                        "Provide one of: region, start+end, feature, primer".into(),
                    )
                    .into());
                };

            if let Some(override_strand) = input.strand {
                strand = override_strand;
            }

            if start < 0 || end < 0 || start > seq_len || end > seq_len {
                return Err(HiveError::Validation(format!(
                    "coordinates out of range for a {seq_len} bp sequence: {start}-{end}"
                ))
                .into());
            }

            let bases: Vec<char> = seq.sequence.chars().collect();
            let subsequence: String = if end >= start {
                bases[start as usize..end as usize].iter().collect()
            } else if circular {
                bases[start as usize..]
                    .iter()
                    .chain(bases[..end as usize].iter())
                    .collect()
            } else {
                return Err(HiveError::Validation(
                    "start > end is only valid for a circular sequence".into(),
                )
                .into());
            };

            let subsequence =
                if strand == -1 { bio::reverse_complement(&subsequence) } else { subsequence };

            Ok(json!({
                "sequence": subsequence,
                "length": subsequence.chars().count(),
                "start": start,
                "end": end,
                "strand": strand,
                "source": source,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileStatus, ParseResult, ParsedFeature};
    use chrono::Utc;
    use serde_json::Value;

    async fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        let file_id = store
            .upsert_file("/lib/a.fa".into(), "h".into(), "fasta".into(), FileStatus::Active, None, 20, Utc::now())
            .await
            .unwrap();
        let parsed = ParseResult {
            name: "plasmidA".into(),
            sequence: "AAAAGAATTCAAAAAAAAAA".into(),
            size_bp: 20,
            topology: "circular".into(),
            description: None,
            features: vec![ParsedFeature {
                name: "ampR".into(),
                feature_type: "CDS".into(),
                start: 4,
                end: 10,
                strand: -1,
                qualifiers: Value::Null,
            }],
            primers: vec![],
            meta: Value::Null,
        };
        store.replace_sequence(file_id, parsed, vec![], "DNA").await.unwrap();
        store
    }

    #[tokio::test]
    async fn extracts_by_coordinates() {
        let tool = ExtractTool { store: seeded_store().await };
        let result = tool
            .execute(json!({"name": "plasmidA", "start": 0, "end": 4}), "direct")
            .await
            .unwrap();
        assert_eq!(result["sequence"], "AAAA");
    }

    #[tokio::test]
    async fn reverse_strand_feature_is_revcomped() {
        let tool = ExtractTool { store: seeded_store().await };
        let result = tool
            .execute(json!({"name": "plasmidA", "feature": "ampR"}), "direct")
            .await
            .unwrap();
        // bases[4..10] = "GAATTC" (minus strand) -> revcomp = "GAATTC" (palindrome)
        assert_eq!(result["sequence"], "GAATTC");
    }

    #[tokio::test]
    async fn circular_wraparound_extraction() {
        let tool = ExtractTool { store: seeded_store().await };
        let result = tool
            .execute(json!({"name": "plasmidA", "start": 18, "end": 2}), "direct")
            .await
            .unwrap();
        assert_eq!(result["sequence"], "AAAA");
    }
}
