//! `blast` tool (C11). Grounded on `hive/tools/blast.py` and
//! `hive/deps/blast.py::run_search()`: detect the query alphabet, pick a
//! program/task, shell out to the appropriate `blast*` binary against the
//! similarity index built by [`crate::blastdb`], and parse its tabular
//! output.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::bio;
use crate::blastdb::FORBIDDEN_FLAGS;
use crate::config::Config;
use crate::error::HiveError;
use crate::store::Store;
use crate::tools::resolve::{resolve_sequence, ResolveOptions};
use crate::tools::{BoxFuture, Tool};

/// Parameters `run_search()` would have shelled out with, before the
/// binary is actually invoked — kept separate from [`BlastTool::execute`]
/// so the short-query heuristic can be checked without a `blast*` binary
/// on `PATH`.
struct SearchPlan {
    program: &'static str,
    task: Option<&'static str>,
    db_prefix: &'static str,
    word_size: Option<u32>,
    dust_no: bool,
    default_evalue: f64,
}

/// Mirrors `hive/deps/blast.py::run_search()`'s tiered short-query
/// heuristic for nucleotide queries: below 20 nt the e-value is relaxed to
/// 1000, below 50 nt to 10, and below 30 nt the task switches to the NCBI
/// "short" variant with `word_size=7` and dust filtering off. Protein
/// queries get the analogous short task/e-value but keep BLAST's default
/// word size and dust settings.
fn plan_search(query: &str, is_nucleotide: bool, config_default_evalue: f64) -> SearchPlan {
    let qlen = query.len();
    if is_nucleotide {
        let task_short = qlen < 30;
        let default_evalue = if qlen < 20 { 1000.0 } else if qlen < 50 { 10.0 } else { config_default_evalue };
        SearchPlan {
            program: "blastn",
            task: if task_short { Some("blastn-short") } else { None },
            db_prefix: "nucl",
            word_size: if task_short { Some(7) } else { None },
            dust_no: task_short,
            default_evalue,
        }
    } else {
        let short = qlen < 30;
        SearchPlan {
            program: "blastp",
            task: if short { Some("blastp-short") } else { None },
            db_prefix: "prot",
            word_size: None,
            dust_no: false,
            default_evalue: if short { 1000.0 } else { config_default_evalue },
        }
    }
}

#[derive(Deserialize)]
struct BlastInput {
    sequence: Option<String>,
    sid: Option<i64>,
    name: Option<String>,
    #[serde(default)]
    evalue: Option<f64>,
    #[serde(default)]
    max_hits: Option<usize>,
    #[serde(default)]
    extra_flags: Vec<String>,
}

fn validate_extra_flags(flags: &[String]) -> anyhow::Result<()> {
    for flag in flags {
        let stripped = flag.trim_start_matches('-').replace('-', "_").to_ascii_lowercase();
        if FORBIDDEN_FLAGS.iter().any(|f| *f == stripped) {
            return Err(HiveError::Validation(format!("flag not permitted: {flag}")).into());
        }
    }
    Ok(())
}

fn bin_path(config: &Config, name: &str) -> PathBuf {
    match &config.blast.bin_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

pub struct BlastTool {
    store: Store,
    config: Arc<Config>,
}

impl BlastTool {
    pub fn new(store: Store, config: Arc<Config>) -> Arc<Self> {
        Arc::new(Self { store, config })
    }
}

impl Tool for BlastTool {
    fn name(&self) -> &'static str { "blast" }
    fn description(&self) -> &'static str {
        "Search the library's similarity index with a sequence (auto-picks blastn/blastp)."
    }
    fn widget(&self) -> &'static str { "blast" }
    fn tags(&self) -> &'static [&'static str] { &["llm", "sequence"] }

    fn guidelines(&self) -> Option<&'static str> {
        Some(
            "Provide a raw sequence, or sid/name to BLAST a library sequence against the rest \
             of the library. Program and task are chosen automatically from the query.",
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sequence": { "type": "string" },
                "sid": { "type": "integer" },
                "name": { "type": "string" },
                "evalue": { "type": "number" },
                "max_hits": { "type": "integer" },
                "extra_flags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Additional blast CLI flags, e.g. -word_size"
                }
            }
        })
    }

    fn format_result(&self, result: &Value) -> String {
        match result.get("total").and_then(|v| v.as_u64()) {
            Some(n) => format!("{n} hit(s)."),
            None => "Search failed.".to_string(),
        }
    }

    fn execute<'a>(&'a self, params: Value, _mode: &'a str) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            let input: BlastInput = serde_json::from_value(params)?;
            validate_extra_flags(&input.extra_flags)?;

            let query = if let Some(seq) = input.sequence {
                seq
            } else if input.sid.is_some() || input.name.is_some() {
                let resolved = resolve_sequence(
                    &self.store,
                    input.sid,
                    input.name.as_deref(),
                    ResolveOptions::default(),
                )
                .await?
                .ok_or_else(|| HiveError::NotFound("Sequence not found".into()))?;
                resolved.sequence.sequence
            } else {
                return Err(HiveError::Validation("Provide sequence, or sid/name".into()).into());
            };

            if query.trim().is_empty() {
                return Err(HiveError::Validation("query sequence is empty".into()).into());
            }

            let is_nucleotide = bio::looks_like_nucleotide_sequence(&query);
            let plan = plan_search(&query, is_nucleotide, self.config.blast.default_evalue);
            let SearchPlan { program, task, db_prefix, word_size, dust_no, default_evalue } = plan;

            let db_path = self.config.blast_dir().join(db_prefix);
            if !db_path.with_extension(if db_prefix == "prot" { "phr" } else { "nhr" }).exists() {
                return Err(HiveError::ExternalTool(
                    "similarity index has not been built yet".into(),
                )
                .into());
            }

            let evalue = input.evalue.unwrap_or(default_evalue);
            let max_hits = input.max_hits.unwrap_or(self.config.blast.default_max_hits);

            let queries_dir = self.config.blast_dir().join("queries");
            tokio::fs::create_dir_all(&queries_dir).await?;
            let query_path = queries_dir.join(format!("{}.fasta", uuid::Uuid::new_v4()));
            tokio::fs::write(&query_path, format!(">query\n{query}\n")).await?;

            let mut cmd = Command::new(bin_path(&self.config, program));
            cmd.arg("-query").arg(&query_path)
                .arg("-db").arg(&db_path)
                .arg("-outfmt").arg("6 qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue bitscore")
                .arg("-evalue").arg(evalue.to_string())
                .arg("-max_target_seqs").arg(max_hits.to_string());
            if let Some(task) = task {
                cmd.arg("-task").arg(task);
            }
            if let Some(word_size) = word_size {
                cmd.arg("-word_size").arg(word_size.to_string());
            }
            if dust_no {
                cmd.arg("-dust").arg("no");
            }
            for flag in &input.extra_flags {
                cmd.arg(flag);
            }

            let output = cmd.output().await;
            let _ = tokio::fs::remove_file(&query_path).await;
            let output = output?;

            if !output.status.success() {
                return Err(HiveError::ExternalTool(format!(
                    "{program} failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ))
                .into());
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            let hits: Vec<Value> = stdout
                .lines()
                .filter_map(|line| parse_hit_line(line))
                .collect();

            Ok(json!({
                "program": program,
                "hits": hits,
                "total": hits.len(),
            }))
        })
    }
}

fn parse_hit_line(line: &str) -> Option<Value> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < 12 {
        return None;
    }
    Some(json!({
        "subject": cols[1],
        "pident": cols[2].parse::<f64>().ok()?,
        "length": cols[3].parse::<i64>().ok()?,
        "mismatch": cols[4].parse::<i64>().ok()?,
        "gapopen": cols[5].parse::<i64>().ok()?,
        "qstart": cols[6].parse::<i64>().ok()?,
        "qend": cols[7].parse::<i64>().ok()?,
        "sstart": cols[8].parse::<i64>().ok()?,
        "send": cols[9].parse::<i64>().ok()?,
        "evalue": cols[10].parse::<f64>().ok()?,
        "bitscore": cols[11].parse::<f64>().ok()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_forbidden_flag() {
        let err = validate_extra_flags(&["-outfmt".to_string(), "5".to_string()]);
        assert!(err.is_err());
    }

    #[test]
    fn allows_benign_flag() {
        assert!(validate_extra_flags(&["-word_size".to_string(), "7".to_string()]).is_ok());
    }

    #[test]
    fn parses_tabular_hit_line() {
        let line = "query\tsubjectA\t98.5\t120\t1\t0\t1\t120\t5\t124\t1e-50\t210";
        let hit = parse_hit_line(line).unwrap();
        assert_eq!(hit["subject"], "subjectA");
        assert_eq!(hit["length"], 120);
    }

    #[test]
    fn short_blastn_query_gets_short_task_and_word_size_seven() {
        let plan = plan_search("ATGCGT", true, 1.0e-5);
        assert_eq!(plan.program, "blastn");
        assert_eq!(plan.task, Some("blastn-short"));
        assert_eq!(plan.word_size, Some(7));
        assert!(plan.dust_no);
        assert_eq!(plan.default_evalue, 1000.0);
    }

    #[test]
    fn mid_length_nucleotide_query_relaxes_evalue_without_short_task() {
        let plan = plan_search(&"ACGT".repeat(10), true, 1.0e-5);
        assert_eq!(plan.task, None);
        assert_eq!(plan.word_size, None);
        assert!(!plan.dust_no);
        assert_eq!(plan.default_evalue, 10.0);
    }

    #[test]
    fn long_nucleotide_query_uses_configured_default_evalue() {
        let plan = plan_search(&"ACGT".repeat(20), true, 1.0e-5);
        assert_eq!(plan.default_evalue, 1.0e-5);
    }
}
