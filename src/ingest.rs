//! Ingestion pipeline (C4). Grounded on `hive/watcher/ingest.py`:
//! hash-gated upsert with cascade-replace on change, directory-segment
//! tag derivation, and parser-failure containment (recorded on the file
//! row, never propagated).

use std::path::Path;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::HiveResult;
use crate::models::{FileStatus, MatchResult};
use crate::parsers;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed,
    Unchanged,
    Errored(String),
}

pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Directory segments of `path` relative to `root`, used as `meta.tags`.
fn derive_tags(root: &Path, path: &Path) -> Vec<String> {
    path.strip_prefix(root)
        .ok()
        .and_then(|rel| rel.parent())
        .map(|dir| {
            dir.components()
                .filter_map(|c| c.as_os_str().to_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn molecule_type_for(format: &str, path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext {
        "rna" => "RNA",
        "prot" => "protein",
        _ if format == "sgffp" => "DNA",
        _ => "DNA",
    }
}

/// Ingest one file per `spec.md` §4.3. Returns `Unchanged` on a hash hit,
/// `Errored` on a contained parser failure, `Indexed` on success.
pub async fn ingest_file(
    store: &Store,
    watcher_root: &Path,
    path: &Path,
    rule: &MatchResult,
) -> HiveResult<IngestOutcome> {
    let file_hash = hash_file(path)?;
    let path_str = path.display().to_string();

    if let Some(existing) = store.get_file_by_path(path_str.clone()).await? {
        if existing.file_hash == file_hash && existing.status != FileStatus::Error {
            return Ok(IngestOutcome::Unchanged);
        }
    }

    let parser_name = rule.parser.as_deref().unwrap_or("biopython");
    let metadata = std::fs::metadata(path)?;
    let file_size = metadata.len() as i64;
    let file_mtime: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let parsed = parsers::resolve_parser(parser_name, path).and_then(|parse_fn| parse_fn(path));

    let parsed = match parsed {
        Ok(p) => p,
        Err(e) => {
            store
                .upsert_file(
                    path_str,
                    file_hash,
                    parser_name.to_string(),
                    FileStatus::Error,
                    Some(e.to_string()),
                    file_size,
                    file_mtime,
                )
                .await?;
            return Ok(IngestOutcome::Errored(e.to_string()));
        }
    };

    let file_id = store
        .upsert_file(
            path_str,
            file_hash,
            parser_name.to_string(),
            FileStatus::Active,
            None,
            file_size,
            file_mtime,
        )
        .await?;

    let tags = derive_tags(watcher_root, path);
    let molecule = molecule_type_for(parser_name, path);
    store.replace_sequence(file_id, parsed, tags, molecule).await?;

    Ok(IngestOutcome::Indexed)
}

/// Mark a file removed (watcher delete event). Cascade handled by the store.
pub async fn remove_file(store: &Store, path: &Path) -> HiveResult<()> {
    store.mark_file_deleted(path.display().to_string()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchResult;
    use tempfile::tempdir;

    fn parse_rule() -> MatchResult {
        MatchResult { action: "parse".into(), parser: Some("biopython".into()), extract: vec![], message: None }
    }

    #[tokio::test]
    async fn ingest_then_reingest_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.fasta");
        std::fs::write(&path, ">seqA\nATGC\n").unwrap();
        let store = Store::open_in_memory().unwrap();

        let first = ingest_file(&store, dir.path(), &path, &parse_rule()).await.unwrap();
        assert_eq!(first, IngestOutcome::Indexed);

        let second = ingest_file(&store, dir.path(), &path, &parse_rule()).await.unwrap();
        assert_eq!(second, IngestOutcome::Unchanged);
    }

    #[tokio::test]
    async fn parser_failure_is_recorded_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.fasta");
        std::fs::write(&path, "not a fasta file at all").unwrap();
        let store = Store::open_in_memory().unwrap();

        let outcome = ingest_file(&store, dir.path(), &path, &parse_rule()).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Errored(_)));
        let file = store.get_file_by_path(path.display().to_string()).await.unwrap().unwrap();
        assert_eq!(file.status, FileStatus::Error);
        assert!(file.error_msg.is_some());
    }

    #[tokio::test]
    async fn tags_derived_from_relative_directory() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("plasmids/bacterial");
        std::fs::create_dir_all(&sub).unwrap();
        let path = sub.join("a.fasta");
        std::fs::write(&path, ">seqA\nATGC\n").unwrap();
        let store = Store::open_in_memory().unwrap();

        ingest_file(&store, dir.path(), &path, &parse_rule()).await.unwrap();
        let seq = store.get_sequence_by_name("seqA".into()).await.unwrap().unwrap();
        assert_eq!(seq.tags(), vec!["plasmids".to_string(), "bacterial".to_string()]);
    }
}
