//! Tool quarantine (C9). Grounded on `hive/tools/factory.py`'s hash-gate:
//! the original scans `.py` files and AST-checks imports; Rust has no
//! equivalent for "parse and vet a Python import list", so external tools
//! here are JSON manifests (see [`crate::tools::factory`]) naming a
//! sandboxed command rather than arbitrary source. The hash-gate itself —
//! the actual quarantine/re-review state machine — carries over unchanged:
//! a manifest is hashed, and any change to its bytes forces re-review
//! before it runs again.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::HiveResult;
use crate::models::ApprovalStatus;
use crate::store::Store;

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Manifest files eligible for quarantine review: `*.tool.json`, not
/// starting with `_` (the underscore-prefix convention for helper files
/// the factory should ignore, carried over from the original's `.py` scan).
fn candidate_manifests(tools_dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    if !tools_dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(tools_dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with('_') || !name.ends_with(".tool.json") {
            continue;
        }
        out.push(path);
    }
    out.sort();
    Ok(out)
}

/// Run the hash-gate over every manifest in `tools_dir`, apply the
/// transition table, and return the filenames that resolved to `approved`
/// (`spec.md` §4.7 step 2a).
pub async fn run_quarantine_scan(store: &Store, tools_dir: &Path) -> HiveResult<Vec<String>> {
    let manifests = candidate_manifests(tools_dir).map_err(crate::error::HiveError::from)?;
    let mut approved = Vec::new();

    for path in manifests {
        let filename = path.file_name().unwrap().to_string_lossy().to_string();
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(_) => continue,
        };
        let hash = hash_bytes(&bytes);

        match store.get_tool_approval(filename.clone()).await? {
            None => {
                store.insert_quarantined(filename.clone(), hash).await?;
            }
            Some(existing) if existing.status == ApprovalStatus::Approved && existing.file_hash == hash => {
                approved.push(filename);
            }
            Some(existing) if existing.status == ApprovalStatus::Approved => {
                tracing::warn!(tool = %filename, "approved tool changed on disk, re-quarantining");
                store.re_quarantine(filename, hash).await?;
            }
            Some(_) => {
                // quarantined or rejected: skip until a human approves it.
            }
        }
    }

    Ok(approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn new_manifest_is_quarantined_not_approved() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("echo.tool.json"), r#"{"name":"echo"}"#).unwrap();
        let store = Store::open_in_memory().unwrap();

        let approved = run_quarantine_scan(&store, dir.path()).await.unwrap();
        assert!(approved.is_empty());
        let row = store.get_tool_approval("echo.tool.json".into()).await.unwrap().unwrap();
        assert_eq!(row.status, ApprovalStatus::Quarantined);
    }

    #[tokio::test]
    async fn approved_unchanged_manifest_is_returned() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("echo.tool.json");
        std::fs::write(&manifest_path, r#"{"name":"echo"}"#).unwrap();
        let store = Store::open_in_memory().unwrap();

        run_quarantine_scan(&store, dir.path()).await.unwrap();
        store.approve_tool("echo.tool.json".into(), "echo".into()).await.unwrap();

        let approved = run_quarantine_scan(&store, dir.path()).await.unwrap();
        assert_eq!(approved, vec!["echo.tool.json".to_string()]);
    }

    #[tokio::test]
    async fn changed_approved_manifest_is_re_quarantined() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("echo.tool.json");
        std::fs::write(&manifest_path, r#"{"name":"echo"}"#).unwrap();
        let store = Store::open_in_memory().unwrap();

        run_quarantine_scan(&store, dir.path()).await.unwrap();
        store.approve_tool("echo.tool.json".into(), "echo".into()).await.unwrap();

        std::fs::write(&manifest_path, r#"{"name":"echo","extra":true}"#).unwrap();
        let approved = run_quarantine_scan(&store, dir.path()).await.unwrap();
        assert!(approved.is_empty());
        let row = store.get_tool_approval("echo.tool.json".into()).await.unwrap().unwrap();
        assert_eq!(row.status, ApprovalStatus::Quarantined);
        assert!(row.reviewed_at.is_none());
    }

    #[test]
    fn ignores_underscore_prefixed_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("_helper.tool.json"), "{}").unwrap();
        std::fs::write(dir.path().join("real.tool.json"), "{}").unwrap();
        let found = candidate_manifests(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("real.tool.json"));
    }
}
