//! Similarity-index builder (C6). Grounded on `hive/deps/blast.py` for
//! the build protocol and on the teacher's `fs2::FileExt` exclusive-lock
//! pattern (`src/ledger.rs::append_event`) for the lockfile itself.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use fs2::FileExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{HiveError, HiveResult};
use crate::models::MoleculeType;
use crate::store::Store;

const STALE_LOCK_SECS: u64 = 600;

/// Forbidden BLAST CLI flags — anything that would redirect I/O or leak
/// data externally. Shared by the builder and the `blast` tool.
pub const FORBIDDEN_FLAGS: &[&str] = &[
    "outfmt", "out", "query", "db", "remote", "html",
    "import_search_strategy", "export_search_strategy",
    "gilist", "negative_gilist", "seqidlist", "negative_seqidlist",
    "entrez_query", "blastdb_version",
];

fn bin_path(config: &Config, name: &str) -> PathBuf {
    match &config.blast.bin_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Try to take the build lock. Returns `Ok(Some(lock_path))` if acquired,
/// `Ok(None)` if another worker is actively building (lock younger than
/// the staleness threshold).
fn try_acquire_lock(dir: &Path) -> HiveResult<Option<(PathBuf, std::fs::File)>> {
    let lock_path = dir.join(".build.lock");

    match std::fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
        Ok(file) => {
            file.lock_exclusive()?;
            Ok(Some((lock_path, file)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let age = std::fs::metadata(&lock_path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|m| SystemTime::now().duration_since(m).ok())
                .unwrap_or(Duration::ZERO);
            if age.as_secs() >= STALE_LOCK_SECS {
                warn!(lock = %lock_path.display(), "reaping stale build lock");
                std::fs::remove_file(&lock_path)?;
                let file = std::fs::OpenOptions::new().write(true).create_new(true).open(&lock_path)?;
                file.lock_exclusive()?;
                Ok(Some((lock_path, file)))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(HiveError::from(e)),
    }
}

fn release_lock(lock_path: &Path, file: std::fs::File) {
    let _ = FileExt::unlock(&file);
    drop(file);
    let _ = std::fs::remove_file(lock_path);
}

/// Whitespace-collapse a sequence name so it round-trips through the
/// external tool (`spec.md` §4.5 step 3).
fn sanitize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Build (or skip, if a concurrent build is in progress) the nucleotide
/// and protein similarity databases from every active sequence.
pub async fn build_index(config: &Config, store: &Store) -> anyhow::Result<()> {
    let dir = config.blast_dir();
    std::fs::create_dir_all(&dir)?;

    let Some((lock_path, lock_file)) = try_acquire_lock(&dir)? else {
        info!("similarity index build already in progress, skipping");
        return Ok(());
    };

    let result = do_build(config, store, &dir).await;
    release_lock(&lock_path, lock_file);
    result
}

async fn do_build(config: &Config, store: &Store, dir: &Path) -> anyhow::Result<()> {
    let sequences = store.list_active_sequences().await?;

    let mut nucl_fasta = String::new();
    let mut prot_fasta = String::new();

    for (seq, _path) in &sequences {
        let name = sanitize_name(&seq.name);
        match seq.molecule_type() {
            MoleculeType::Protein => {
                prot_fasta.push_str(&format!(">{name}\n{}\n", seq.sequence));
            }
            MoleculeType::Rna => {
                nucl_fasta.push_str(&format!(">{name}\n{}\n", seq.sequence.replace('U', "T")));
            }
            MoleculeType::Dna => {
                nucl_fasta.push_str(&format!(">{name}\n{}\n", seq.sequence));
            }
        }
    }

    for stale in ["nucl", "prot"] {
        for ext in ["nhr", "nin", "nsq", "phr", "pin", "psq", "ndb", "pdb", "not", "ntf", "nto"] {
            let _ = std::fs::remove_file(dir.join(format!("{stale}.{ext}")));
        }
    }

    if !nucl_fasta.is_empty() {
        build_one(config, dir, "nucl", &nucl_fasta).await?;
    }
    if !prot_fasta.is_empty() {
        build_one(config, dir, "prot", &prot_fasta).await?;
    }

    info!(sequences = sequences.len(), "similarity index rebuilt");
    Ok(())
}

async fn build_one(config: &Config, dir: &Path, prefix: &str, fasta: &str) -> anyhow::Result<()> {
    let fasta_path = dir.join(format!("{prefix}.fasta"));
    tokio::fs::write(&fasta_path, fasta).await?;

    let dbtype = if prefix == "prot" { "prot" } else { "nucl" };
    let out_prefix = dir.join(prefix);

    let output = Command::new(bin_path(config, "makeblastdb"))
        .arg("-in").arg(&fasta_path)
        .arg("-dbtype").arg(dbtype)
        .arg("-out").arg(&out_prefix)
        .arg("-blastdb_version").arg("5")
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!(
            "makeblastdb failed for {prefix}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_acquire_and_release_roundtrip() {
        let dir = tempdir().unwrap();
        let (lock_path, file) = try_acquire_lock(dir.path()).unwrap().unwrap();
        assert!(lock_path.exists());
        // Concurrent acquisition attempt is blocked while lock is fresh.
        assert!(try_acquire_lock(dir.path()).unwrap().is_none());
        release_lock(&lock_path, file);
        assert!(!lock_path.exists());
    }

    #[test]
    fn sanitizes_whitespace_in_names() {
        assert_eq!(sanitize_name("my  plasmid  name"), "my_plasmid_name");
    }
}
