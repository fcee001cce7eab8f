//! Watcher (C5): initial scan + live change stream over the library root.
//! Grounded on `hive/watcher/watcher.py` for the batch/scan protocol and
//! on the teacher's `notify::recommended_watcher` + debounced-mpsc idiom
//! (`src/dashboard/handlers.rs::event_stream`) for the live side.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher as NotifyWatcher};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::blastdb;
use crate::config::Config;
use crate::ingest::{self, IngestOutcome};
use crate::rules;
use crate::store::Store;

const SCAN_BATCH_SIZE: usize = 100;

/// Enumerate every file under `root` (respecting the recursive flag).
fn enumerate_files(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if recursive || dir == root {
                    stack.push(path);
                }
            } else {
                out.push(path);
            }
        }
    }
    out
}

/// Scan phase: enumerate, classify, ingest in batches, rebuild the
/// similarity index once if anything changed. Returns the number of files
/// indexed (created or updated).
pub async fn scan_and_ingest(
    config: &Config,
    store: &Store,
    stop: &watch::Receiver<bool>,
) -> anyhow::Result<usize> {
    let root = &config.watcher.root;
    let files = enumerate_files(root, config.watcher.recursive);
    let mut indexed = 0usize;
    let mut processed_in_batch = 0usize;

    for path in files {
        if *stop.borrow() {
            break;
        }
        let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or_default();
        let rule = rules::match_file(&config.watcher, filename);
        if rule.action == "parse" {
            match ingest::ingest_file(store, root, &path, &rule).await {
                Ok(IngestOutcome::Indexed) => indexed += 1,
                Ok(IngestOutcome::Unchanged) => {}
                Ok(IngestOutcome::Errored(msg)) => warn!(path = %path.display(), error = %msg, "ingest failed"),
                Err(e) => warn!(path = %path.display(), error = %e, "ingest error"),
            }
        }
        processed_in_batch += 1;
        if processed_in_batch >= SCAN_BATCH_SIZE {
            info!(indexed, "scan progress");
            processed_in_batch = 0;
            tokio::task::yield_now().await;
        }
    }

    if indexed > 0 {
        blastdb::build_index(config, store).await?;
    }
    Ok(indexed)
}

/// Live phase: subscribe to filesystem events under the root and react.
/// Honours `stop` for prompt cancellation.
pub async fn watch_directory(
    config: Arc<Config>,
    store: Store,
    mut stop: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<Event>(256);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = tx.blocking_send(event);
        }
    })?;
    let mode = if config.watcher.recursive { RecursiveMode::Recursive } else { RecursiveMode::NonRecursive };
    watcher.watch(&config.watcher.root, mode)?;

    loop {
        tokio::select! {
            _ = stop.changed() => {
                if *stop.borrow() {
                    info!("watcher stopping");
                    break;
                }
            }
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break };
                handle_event(&config, &store, event).await;
            }
        }
    }
    Ok(())
}

async fn handle_event(config: &Config, store: &Store, event: Event) {
    match event.kind {
        EventKind::Remove(_) => {
            for path in event.paths {
                if let Err(e) = ingest::remove_file(store, &path).await {
                    warn!(path = %path.display(), error = %e, "failed to mark file deleted");
                }
            }
        }
        EventKind::Create(_) | EventKind::Modify(_) => {
            let mut any_indexed = false;
            for path in event.paths {
                if !path.is_file() {
                    continue;
                }
                let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or_default();
                let rule = rules::match_file(&config.watcher, filename);
                if rule.action != "parse" {
                    continue;
                }
                match ingest::ingest_file(store, &config.watcher.root, &path, &rule).await {
                    Ok(IngestOutcome::Indexed) => any_indexed = true,
                    Ok(_) => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "ingest error"),
                }
            }
            if any_indexed {
                if let Err(e) = blastdb::build_index(config, store).await {
                    warn!(error = %e, "similarity index rebuild failed");
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn scan_indexes_matching_files_and_skips_others() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.fasta"), ">seqA\nATGC\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let mut config = Config::default();
        config.watcher.root = dir.path().to_path_buf();
        let store = Store::open_in_memory().unwrap();
        let (_tx, rx) = watch::channel(false);

        let indexed = scan_and_ingest(&config, &store, &rx).await.unwrap();
        assert_eq!(indexed, 1);
        assert!(store.get_sequence_by_name("seqA".into()).await.unwrap().is_some());
    }
}
