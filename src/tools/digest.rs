//! `digest` tool (C11): restriction-enzyme digest. Grounded on
//! `hive/tools/digest.py`'s use of Biopython's `RestrictionBatch`; the
//! recognition-site table here covers the common six-cutters used in
//! cloning rather than the full REBASE catalogue.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::HiveError;
use crate::tools::{BoxFuture, Tool};

/// `(recognition site, cut offset from the start of the site on the top strand)`.
fn enzyme_table() -> HashMap<&'static str, (&'static str, usize)> {
    HashMap::from([
        ("EcoRI", ("GAATTC", 1)),
        ("BamHI", ("GGATCC", 1)),
        ("HindIII", ("AAGCTT", 1)),
        ("NotI", ("GCGGCCGC", 2)),
        ("XhoI", ("CTCGAG", 1)),
        ("XbaI", ("TCTAGA", 1)),
        ("SalI", ("GTCGAC", 1)),
        ("PstI", ("CTGCAG", 5)),
        ("SmaI", ("CCCGGG", 3)),
        ("KpnI", ("GGTACC", 5)),
        ("SacI", ("GAGCTC", 5)),
        ("NcoI", ("CCATGG", 1)),
        ("NdeI", ("CATATG", 2)),
        ("SpeI", ("ACTAGT", 1)),
        ("ApaI", ("GGGCCC", 5)),
    ])
}

fn find_cut_sites(sequence: &str, site: &str, offset: usize, circular: bool) -> Vec<usize> {
    let seq = sequence.to_ascii_uppercase();
    let n = seq.len();
    // For a circular molecule a site may straddle the origin; search a
    // sequence extended by the site's own length minus one to catch it.
    let search_space: String = if circular && n > 0 {
        format!("{seq}{}", &seq[..site.len().saturating_sub(1).min(n)])
    } else {
        seq.clone()
    };

    let mut cuts = Vec::new();
    let bytes = search_space.as_bytes();
    let site_bytes = site.as_bytes();
    if site_bytes.is_empty() || bytes.len() < site_bytes.len() {
        return cuts;
    }
    for i in 0..=(bytes.len() - site_bytes.len()) {
        if i >= n {
            break;
        }
        if &bytes[i..i + site_bytes.len()] == site_bytes {
            cuts.push((i + offset) % n.max(1));
        }
    }
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// Fragment sizes from a sorted, deduped set of cut positions (0..len).
fn fragment_sizes(cuts: &[usize], len: usize, circular: bool) -> Vec<usize> {
    if cuts.is_empty() {
        return vec![len];
    }
    let mut fragments = Vec::new();
    for w in cuts.windows(2) {
        fragments.push(w[1] - w[0]);
    }
    if circular {
        // Wrap the last fragment back to the first cut across the origin.
        fragments.push(len - cuts[cuts.len() - 1] + cuts[0]);
    } else {
        fragments.insert(0, cuts[0]);
        fragments.push(len - cuts[cuts.len() - 1]);
    }
    fragments.sort_unstable_by(|a, b| b.cmp(a));
    fragments
}

#[derive(Deserialize)]
struct DigestInput {
    sequence: String,
    enzymes: Vec<String>,
    #[serde(default = "default_circular")]
    circular: bool,
}

fn default_circular() -> bool {
    true
}

pub struct DigestTool;

impl Tool for DigestTool {
    fn name(&self) -> &'static str { "digest" }
    fn description(&self) -> &'static str { "Compute restriction-enzyme cut sites and fragment sizes." }
    fn widget(&self) -> &'static str { "digest" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "sequence"] }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sequence": { "type": "string" },
                "enzymes": { "type": "array", "items": { "type": "string" } },
                "circular": { "type": "boolean", "default": true }
            },
            "required": ["sequence", "enzymes"]
        })
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: DigestInput = serde_json::from_value(params)?;
            let table = enzyme_table();

            let mut unknown = Vec::new();
            for name in &input.enzymes {
                if !table.contains_key(name.as_str()) {
                    unknown.push(name.clone());
                }
            }
            if !unknown.is_empty() {
                return Err(HiveError::Validation(format!(
                    "unknown enzyme(s): {}",
                    unknown.join(", ")
                ))
                .into());
            }

            let mut per_enzyme = Vec::new();
            let mut all_cuts = Vec::new();
            for name in &input.enzymes {
                let (site, offset) = table[name.as_str()];
                let cuts = find_cut_sites(&input.sequence, site, offset, input.circular);
                all_cuts.extend(cuts.iter().copied());
                per_enzyme.push(json!({ "enzyme": name, "sites": cuts }));
            }
            all_cuts.sort_unstable();
            all_cuts.dedup();

            let fragments = fragment_sizes(&all_cuts, input.sequence.len(), input.circular);

            Ok(json!({
                "enzymes": per_enzyme,
                "cut_sites": all_cuts,
                "fragments": fragments,
                "fragment_count": fragments.len(),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unknown_enzyme() {
        let tool = DigestTool;
        let result = tool
            .execute(json!({"sequence": "ATGC", "enzymes": ["NotAnEnzyme"]}), "direct")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn single_cutter_on_circular_molecule_yields_one_fragment() {
        let tool = DigestTool;
        // EcoRI site GAATTC once in a 20 bp circular sequence.
        let seq = "AAAAGAATTCAAAAAAAAAA";
        let result = tool
            .execute(json!({"sequence": seq, "enzymes": ["EcoRI"], "circular": true}), "direct")
            .await
            .unwrap();
        assert_eq!(result["fragment_count"], 1);
        assert_eq!(result["fragments"][0], 20);
    }

    #[test]
    fn linear_fragments_have_distinct_ends() {
        let cuts = vec![5, 10];
        let frags = fragment_sizes(&cuts, 20, false);
        let mut sorted = frags.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![5, 5, 10]);
    }
}
