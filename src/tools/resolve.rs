//! Sequence resolver (C10). Grounded on `hive/tools/resolve.py`: SID
//! takes precedence, otherwise case-insensitive exact name; only
//! sequences belonging to an active file are visible. Features/primers/
//! file are optionally eager-loaded to avoid N+1 queries at call sites.

use crate::error::HiveResult;
use crate::models::{Feature, IndexedFile, Primer, Sequence};
use crate::store::Store;

#[derive(Default)]
pub struct ResolveOptions {
    pub load_features: bool,
    pub load_primers: bool,
    pub load_file: bool,
}

pub struct ResolvedSequence {
    pub sequence: Sequence,
    pub features: Vec<Feature>,
    pub primers: Vec<Primer>,
    pub file: Option<IndexedFile>,
}

pub async fn resolve_sequence(
    store: &Store,
    sid: Option<i64>,
    name: Option<&str>,
    opts: ResolveOptions,
) -> HiveResult<Option<ResolvedSequence>> {
    let sequence = if let Some(sid) = sid {
        store.get_sequence_by_sid(sid).await?
    } else if let Some(name) = name {
        store.get_sequence_by_name(name.to_string()).await?
    } else {
        None
    };

    let Some(sequence) = sequence else { return Ok(None) };

    let features = if opts.load_features {
        store.list_features(sequence.id, None).await?
    } else {
        Vec::new()
    };
    let primers = if opts.load_primers {
        store.list_primers(sequence.id).await?
    } else {
        Vec::new()
    };
    let file = if opts.load_file {
        store.get_file(sequence.file_id).await?
    } else {
        None
    };

    Ok(Some(ResolvedSequence { sequence, features, primers, file }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileStatus, ParseResult};
    use chrono::Utc;
    use serde_json::Value;

    async fn seeded_store() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let file_id = store
            .upsert_file("/lib/a.fa".into(), "h".into(), "fasta".into(), FileStatus::Active, None, 4, Utc::now())
            .await
            .unwrap();
        let parsed = ParseResult {
            name: "pUC19".into(),
            sequence: "ATGC".into(),
            size_bp: 4,
            topology: "circular".into(),
            description: None,
            features: vec![],
            primers: vec![],
            meta: Value::Null,
        };
        let sid = store.replace_sequence(file_id, parsed, vec![], "DNA").await.unwrap();
        (store, sid)
    }

    #[tokio::test]
    async fn sid_takes_precedence_over_name() {
        let (store, sid) = seeded_store().await;
        let resolved = resolve_sequence(&store, Some(sid), Some("wrong-name"), ResolveOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.sequence.name, "pUC19");
    }

    #[tokio::test]
    async fn name_lookup_is_case_insensitive() {
        let (store, _) = seeded_store().await;
        let resolved = resolve_sequence(&store, None, Some("puc19"), ResolveOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.sequence.name, "pUC19");
    }

    #[tokio::test]
    async fn missing_selector_returns_none() {
        let (store, _) = seeded_store().await;
        let resolved = resolve_sequence(&store, None, None, ResolveOptions::default()).await.unwrap();
        assert!(resolved.is_none());
    }
}
