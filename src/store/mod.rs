//! Index store (C3): typed rows for files, sequences, features, primers,
//! plus the fuzzy-search query surface the `search` tool depends on.
//! Exposes short-lived operations that commit before returning, matching
//! the "sessions are short-lived, writes commit before yielding" policy
//! of `SPEC_FULL.md` §5.

pub mod fuzzy;
pub mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{HiveError, HiveResult};
use crate::models::{
    slugify, ApprovalStatus, Feature, FileStatus, IndexedFile, ParseResult, Primer, Sequence,
    Strand, ToolApproval, Topology, User,
};

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

/// Boolean composition mode parsed from a search query (C3 §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolMode {
    And,
    Or,
    Single,
}

#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub topology: Option<String>,
    pub size_min: Option<i64>,
    pub size_max: Option<i64>,
    pub feature_type: Option<String>,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self { topology: None, size_min: None, size_max: None, feature_type: None }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResultItem {
    pub sid: i64,
    pub name: String,
    pub size_bp: i64,
    pub topology: String,
    pub features: Vec<String>,
    pub tags: Vec<String>,
    pub file_path: String,
    pub score: f64,
}

impl Store {
    /// Open (creating if absent) the SQLite file at `path` and run migrations.
    pub fn open(path: &Path) -> HiveResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> HiveResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> HiveResult<T>
    where
        F: FnOnce(&Connection) -> HiveResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("store mutex poisoned");
            f(&guard)
        })
        .await
        .map_err(|e| HiveError::Internal(anyhow::anyhow!(e)))?
    }

    // ---- IndexedFile ----------------------------------------------------

    pub async fn get_file_by_path(&self, path: String) -> HiveResult<Option<IndexedFile>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, file_path, file_hash, format, status, error_msg, file_size, file_mtime, indexed_at
                 FROM indexed_files WHERE file_path = ?1",
                params![path],
                row_to_file,
            )
            .optional()
            .map_err(HiveError::from)
        })
        .await
    }

    /// Insert or update a file row in place (C4 step 5). Returns the id.
    pub async fn upsert_file(
        &self,
        file_path: String,
        file_hash: String,
        format: String,
        status: FileStatus,
        error_msg: Option<String>,
        file_size: i64,
        file_mtime: DateTime<Utc>,
    ) -> HiveResult<i64> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO indexed_files (file_path, file_hash, format, status, error_msg, file_size, file_mtime, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
                 ON CONFLICT(file_path) DO UPDATE SET
                    file_hash = excluded.file_hash,
                    format = excluded.format,
                    status = excluded.status,
                    error_msg = excluded.error_msg,
                    file_size = excluded.file_size,
                    file_mtime = excluded.file_mtime,
                    indexed_at = datetime('now')",
                params![
                    file_path,
                    file_hash,
                    format,
                    status.as_str(),
                    error_msg,
                    file_size,
                    file_mtime.to_rfc3339(),
                ],
            )?;
            let id: i64 = conn.query_row(
                "SELECT id FROM indexed_files WHERE file_path = ?1",
                params![file_path],
                |r| r.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    /// Mark a file deleted and cascade-remove its sequences (P3).
    pub async fn mark_file_deleted(&self, file_path: String) -> HiveResult<()> {
        self.with_conn(move |conn| {
            let id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM indexed_files WHERE file_path = ?1",
                    params![file_path],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = id {
                conn.execute("DELETE FROM sequences WHERE file_id = ?1", params![id])?;
                conn.execute(
                    "UPDATE indexed_files SET status = 'deleted' WHERE id = ?1",
                    params![id],
                )?;
            }
            Ok(())
        })
        .await
    }

    /// Replace all sequences/features/primers for `file_id` with a freshly
    /// parsed result (C4 steps 5-7): deletes the old cascade, inserts one
    /// Sequence then its Features and Primers.
    pub async fn replace_sequence(
        &self,
        file_id: i64,
        parsed: ParseResult,
        tags: Vec<String>,
        molecule_type: &'static str,
    ) -> HiveResult<i64> {
        let meta = serde_json::json!({ "tags": tags, "molecule_type": molecule_type });
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sequences WHERE file_id = ?1", params![file_id])?;
            conn.execute(
                "INSERT INTO sequences (file_id, name, size_bp, topology, sequence, description, meta, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'), datetime('now'))",
                params![
                    file_id,
                    parsed.name,
                    parsed.size_bp,
                    parsed.topology,
                    parsed.sequence,
                    parsed.description,
                    meta.to_string(),
                ],
            )?;
            let seq_id = conn.last_insert_rowid();

            for f in &parsed.features {
                conn.execute(
                    "INSERT INTO features (seq_id, name, type, start, end, strand, qualifiers)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        seq_id,
                        f.name,
                        f.feature_type,
                        f.start,
                        f.end,
                        f.strand as i64,
                        f.qualifiers.to_string(),
                    ],
                )?;
            }
            for p in &parsed.primers {
                conn.execute(
                    "INSERT INTO primers (seq_id, name, sequence, tm, start, end, strand)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        seq_id,
                        p.name,
                        p.sequence,
                        p.tm,
                        p.start,
                        p.end,
                        p.strand.map(|s| s as i64),
                    ],
                )?;
            }
            Ok(seq_id)
        })
        .await
    }

    // ---- Sequence resolution (C10) --------------------------------------

    pub async fn get_sequence_by_sid(&self, sid: i64) -> HiveResult<Option<Sequence>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT s.id, s.file_id, s.name, s.size_bp, s.topology, s.sequence, s.description, s.meta, s.created_at, s.updated_at
                 FROM sequences s JOIN indexed_files f ON f.id = s.file_id
                 WHERE s.id = ?1 AND f.status = 'active'",
                params![sid],
                row_to_sequence,
            )
            .optional()
            .map_err(HiveError::from)
        })
        .await
    }

    pub async fn get_sequence_by_name(&self, name: String) -> HiveResult<Option<Sequence>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT s.id, s.file_id, s.name, s.size_bp, s.topology, s.sequence, s.description, s.meta, s.created_at, s.updated_at
                 FROM sequences s JOIN indexed_files f ON f.id = s.file_id
                 WHERE f.status = 'active' AND lower(s.name) = lower(?1)
                 LIMIT 1",
                params![name],
                row_to_sequence,
            )
            .optional()
            .map_err(HiveError::from)
        })
        .await
    }

    pub async fn get_file(&self, file_id: i64) -> HiveResult<Option<IndexedFile>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, file_path, file_hash, format, status, error_msg, file_size, file_mtime, indexed_at
                 FROM indexed_files WHERE id = ?1",
                params![file_id],
                row_to_file,
            )
            .optional()
            .map_err(HiveError::from)
        })
        .await
    }

    pub async fn list_features(&self, seq_id: i64, feature_type: Option<String>) -> HiveResult<Vec<Feature>> {
        self.with_conn(move |conn| {
            let mut stmt = if feature_type.is_some() {
                conn.prepare(
                    "SELECT id, seq_id, name, type, start, end, strand, qualifiers
                     FROM features WHERE seq_id = ?1 AND type = ?2 ORDER BY start",
                )?
            } else {
                conn.prepare(
                    "SELECT id, seq_id, name, type, start, end, strand, qualifiers
                     FROM features WHERE seq_id = ?1 ORDER BY start",
                )?
            };
            let rows = if let Some(t) = &feature_type {
                stmt.query_map(params![seq_id, t], row_to_feature)?
            } else {
                stmt.query_map(params![seq_id], row_to_feature)?
            };
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(HiveError::from)
        })
        .await
    }

    pub async fn list_primers(&self, seq_id: i64) -> HiveResult<Vec<Primer>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, seq_id, name, sequence, tm, start, end, strand
                 FROM primers WHERE seq_id = ?1 ORDER BY start",
            )?;
            let rows = stmt.query_map(params![seq_id], row_to_primer)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(HiveError::from)
        })
        .await
    }

    /// Every active sequence, used by the BLAST index builder (C6) and by
    /// in-process fuzzy search.
    pub async fn list_active_sequences(&self) -> HiveResult<Vec<(Sequence, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.file_id, s.name, s.size_bp, s.topology, s.sequence, s.description, s.meta, s.created_at, s.updated_at, f.file_path
                 FROM sequences s JOIN indexed_files f ON f.id = s.file_id
                 WHERE f.status = 'active'",
            )?;
            let rows = stmt.query_map([], |row| {
                let seq = row_to_sequence(row)?;
                let path: String = row.get(10)?;
                Ok((seq, path))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(HiveError::from)
        })
        .await
    }

    /// Fuzzy + boolean search over sequences (C3 §4.2 / §4.9 `search`).
    pub async fn search(
        &self,
        terms: Vec<String>,
        mode: BoolMode,
        tags: Option<String>,
        filters: SearchFilters,
    ) -> HiveResult<Vec<SearchResultItem>> {
        let candidates = self.list_active_sequences().await?;
        let mut items = Vec::new();

        for (seq, file_path) in candidates {
            if let Some(t) = &filters.topology {
                if seq.topology.as_str() != t {
                    continue;
                }
            }
            if let Some(min) = filters.size_min {
                if seq.size_bp < min {
                    continue;
                }
            }
            if let Some(max) = filters.size_max {
                if seq.size_bp > max {
                    continue;
                }
            }
            let feature_names: Vec<String> = self
                .list_features(seq.id, filters.feature_type.clone())
                .await?
                .into_iter()
                .map(|f| f.name)
                .collect();
            if filters.feature_type.is_some() && feature_names.is_empty() {
                continue;
            }

            let seq_tags = seq.tags();
            let mut per_term_scores = Vec::new();
            let mut matched_any = true;

            for term in &terms {
                let topology_literal = term.eq_ignore_ascii_case(seq.topology.as_str());
                let name_score = fuzzy::similarity(term, &seq.name);
                let desc_score = seq
                    .description
                    .as_deref()
                    .map(|d| fuzzy::similarity(term, d))
                    .unwrap_or(0.0);
                let feature_score =
                    fuzzy::max_similarity(term, feature_names.iter().map(|s| s.as_str()));
                let tag_score =
                    fuzzy::max_similarity(term, seq_tags.iter().map(|s| s.as_str()));
                let mut score = name_score.max(desc_score).max(feature_score).max(tag_score);
                if topology_literal {
                    score = score.max(1.0);
                }
                if score < fuzzy::SIMILARITY_FLOOR && !topology_literal {
                    matched_any = matched_any && mode != BoolMode::And;
                }
                per_term_scores.push(score);
            }

            let combined = match mode {
                BoolMode::And => per_term_scores.iter().cloned().fold(f64::INFINITY, f64::min),
                BoolMode::Or | BoolMode::Single => {
                    per_term_scores.iter().cloned().fold(0.0, f64::max)
                }
            };

            let passes = match mode {
                BoolMode::And => per_term_scores.iter().all(|s| *s >= fuzzy::SIMILARITY_FLOOR),
                BoolMode::Or | BoolMode::Single => {
                    per_term_scores.iter().any(|s| *s >= fuzzy::SIMILARITY_FLOOR)
                }
            };

            if !passes || !matched_any {
                continue;
            }

            if let Some(tag_query) = &tags {
                if fuzzy::max_similarity(tag_query, seq_tags.iter().map(|s| s.as_str()))
                    < fuzzy::SIMILARITY_FLOOR
                {
                    continue;
                }
            }

            items.push(SearchResultItem {
                sid: seq.id,
                name: seq.name.clone(),
                size_bp: seq.size_bp,
                topology: seq.topology.as_str().to_string(),
                features: feature_names,
                tags: seq_tags,
                file_path,
                score: combined,
            });
        }

        items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(items)
    }

    // ---- Tool approvals (C9) --------------------------------------------

    pub async fn get_tool_approval(&self, filename: String) -> HiveResult<Option<ToolApproval>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, filename, file_hash, tool_name, status, created_at, reviewed_at
                 FROM tool_approvals WHERE filename = ?1",
                params![filename],
                row_to_approval,
            )
            .optional()
            .map_err(HiveError::from)
        })
        .await
    }

    pub async fn insert_quarantined(&self, filename: String, file_hash: String) -> HiveResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tool_approvals (filename, file_hash, status, created_at)
                 VALUES (?1, ?2, 'quarantined', datetime('now'))",
                params![filename, file_hash],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn re_quarantine(&self, filename: String, file_hash: String) -> HiveResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE tool_approvals SET file_hash = ?2, status = 'quarantined', reviewed_at = NULL
                 WHERE filename = ?1",
                params![filename, file_hash],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn approve_tool(&self, filename: String, tool_name: String) -> HiveResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE tool_approvals SET status = 'approved', tool_name = ?2, reviewed_at = datetime('now')
                 WHERE filename = ?1",
                params![filename, tool_name],
            )?;
            Ok(())
        })
        .await
    }

    // ---- users & preferences (ambient stack, SPEC_FULL.md §3) -------------

    /// Single-tenant: there is exactly one user row, created on first
    /// connect. Not used for authorization, only as a home for
    /// preferences and feedback attribution.
    pub async fn get_or_create_default_user(&self) -> HiveResult<User> {
        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT id, username, slug, token, preferences, created_at FROM users LIMIT 1",
                    [],
                    row_to_user,
                )
                .optional()?;
            if let Some(user) = existing {
                return Ok(user);
            }
            let username = "local";
            let slug = slugify(username);
            let token = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO users (username, slug, token, preferences, created_at)
                 VALUES (?1, ?2, ?3, '{}', datetime('now'))",
                params![username, slug, token],
            )?;
            conn.query_row(
                "SELECT id, username, slug, token, preferences, created_at FROM users WHERE id = ?1",
                params![conn.last_insert_rowid()],
                row_to_user,
            )
            .map_err(HiveError::from)
        })
        .await
    }

    pub async fn update_preference(&self, user_id: i64, key: String, value: Value) -> HiveResult<Value> {
        self.with_conn(move |conn| {
            let raw: String =
                conn.query_row("SELECT preferences FROM users WHERE id = ?1", params![user_id], |r| r.get(0))?;
            let mut prefs: Value = serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({}));
            if let Some(obj) = prefs.as_object_mut() {
                obj.insert(key, value);
            }
            conn.execute(
                "UPDATE users SET preferences = ?2 WHERE id = ?1",
                params![user_id, prefs.to_string()],
            )?;
            Ok(prefs)
        })
        .await
    }

    pub async fn create_feedback(
        &self,
        user_id: i64,
        chat_id: Option<String>,
        rating: String,
        priority: i64,
        comment: String,
    ) -> HiveResult<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO feedback (user_id, chat_id, rating, priority, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
                params![user_id, chat_id, rating, priority, comment],
            )?;
            Ok(())
        })
        .await
    }

    // ---- status (C15) ----------------------------------------------------

    pub async fn counts(&self) -> HiveResult<(i64, i64, i64, i64)> {
        self.with_conn(|conn| {
            let files: i64 = conn.query_row(
                "SELECT COUNT(*) FROM indexed_files WHERE status = 'active'",
                [],
                |r| r.get(0),
            )?;
            let sequences: i64 = conn.query_row("SELECT COUNT(*) FROM sequences", [], |r| r.get(0))?;
            let features: i64 = conn.query_row("SELECT COUNT(*) FROM features", [], |r| r.get(0))?;
            let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok((files, sequences, features, users))
        })
        .await
    }

    pub async fn last_indexed_at(&self) -> HiveResult<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            let last: Option<String> =
                conn.query_row("SELECT MAX(indexed_at) FROM indexed_files", [], |r| r.get(0))?;
            Ok(last.map(|s| parse_ts(&s)))
        })
        .await
    }
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<IndexedFile> {
    let status: String = row.get(4)?;
    let mtime: String = row.get(7)?;
    let indexed: String = row.get(8)?;
    Ok(IndexedFile {
        id: row.get(0)?,
        file_path: row.get(1)?,
        file_hash: row.get(2)?,
        format: row.get(3)?,
        status: FileStatus::parse(&status),
        error_msg: row.get(5)?,
        file_size: row.get(6)?,
        file_mtime: parse_ts(&mtime),
        indexed_at: parse_ts(&indexed),
    })
}

fn row_to_sequence(row: &rusqlite::Row) -> rusqlite::Result<Sequence> {
    let topology: String = row.get(4)?;
    let meta: String = row.get(7)?;
    let created: String = row.get(8)?;
    let updated: String = row.get(9)?;
    Ok(Sequence {
        id: row.get(0)?,
        file_id: row.get(1)?,
        name: row.get(2)?,
        size_bp: row.get(3)?,
        topology: Topology::parse(&topology),
        sequence: row.get(5)?,
        description: row.get(6)?,
        meta: serde_json::from_str(&meta).unwrap_or(Value::Null),
        created_at: parse_ts(&created),
        updated_at: parse_ts(&updated),
    })
}

fn row_to_feature(row: &rusqlite::Row) -> rusqlite::Result<Feature> {
    let strand: i64 = row.get(6)?;
    let qualifiers: Option<String> = row.get(7)?;
    Ok(Feature {
        id: row.get(0)?,
        seq_id: row.get(1)?,
        name: row.get(2)?,
        feature_type: row.get(3)?,
        start: row.get(4)?,
        end: row.get(5)?,
        strand: Strand::from_i8(strand as i8),
        qualifiers: qualifiers.and_then(|q| serde_json::from_str(&q).ok()),
    })
}

fn row_to_primer(row: &rusqlite::Row) -> rusqlite::Result<Primer> {
    let strand: Option<i64> = row.get(7)?;
    Ok(Primer {
        id: row.get(0)?,
        seq_id: row.get(1)?,
        name: row.get(2)?,
        sequence: row.get(3)?,
        tm: row.get(4)?,
        start: row.get(5)?,
        end: row.get(6)?,
        strand: strand.map(|s| Strand::from_i8(s as i8)),
    })
}

fn row_to_approval(row: &rusqlite::Row) -> rusqlite::Result<ToolApproval> {
    let status: String = row.get(4)?;
    let created: String = row.get(5)?;
    let reviewed: Option<String> = row.get(6)?;
    Ok(ToolApproval {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_hash: row.get(2)?,
        tool_name: row.get(3)?,
        status: ApprovalStatus::parse(&status),
        created_at: parse_ts(&created),
        reviewed_at: reviewed.map(|r| parse_ts(&r)),
    })
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let prefs: String = row.get(4)?;
    let created: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        slug: row.get(2)?,
        token: row.get(3)?,
        preferences: serde_json::from_str(&prefs).unwrap_or_else(|_| serde_json::json!({})),
        created_at: parse_ts(&created),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|d| DateTime::from_naive_utc_and_offset(d, Utc))
                .unwrap_or_else(|_| Utc::now())
        })
}

/// Split a search query on `&&` / `||` (`spec.md` §4.2); mirrors
/// `hive/tools/search.py::_parse_bool_query()`.
pub fn parse_bool_query(query: &str) -> (Vec<String>, BoolMode) {
    if query.contains("&&") {
        let terms = query.split("&&").map(|s| s.trim().to_string()).collect();
        (terms, BoolMode::And)
    } else if query.contains("||") {
        let terms = query.split("||").map(|s| s.trim().to_string()).collect();
        (terms, BoolMode::Or)
    } else {
        (vec![query.trim().to_string()], BoolMode::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_query() {
        let (terms, mode) = parse_bool_query("pKan && linear");
        assert_eq!(mode, BoolMode::And);
        assert_eq!(terms, vec!["pKan".to_string(), "linear".to_string()]);
    }

    #[test]
    fn parses_single_query() {
        let (terms, mode) = parse_bool_query("pUC");
        assert_eq!(mode, BoolMode::Single);
        assert_eq!(terms, vec!["pUC".to_string()]);
    }

    #[tokio::test]
    async fn upsert_then_fetch_file() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .upsert_file(
                "/lib/a.fa".into(),
                "hash1".into(),
                "fasta".into(),
                FileStatus::Active,
                None,
                10,
                Utc::now(),
            )
            .await
            .unwrap();
        let fetched = store.get_file(id).await.unwrap().unwrap();
        assert_eq!(fetched.file_hash, "hash1");
    }

    #[tokio::test]
    async fn mark_deleted_cascades_sequences() {
        let store = Store::open_in_memory().unwrap();
        let file_id = store
            .upsert_file("/lib/a.fa".into(), "h1".into(), "fasta".into(), FileStatus::Active, None, 4, Utc::now())
            .await
            .unwrap();
        let parsed = ParseResult {
            name: "seqA".into(),
            sequence: "ATGC".into(),
            size_bp: 4,
            topology: "linear".into(),
            description: None,
            features: vec![],
            primers: vec![],
            meta: Value::Null,
        };
        store.replace_sequence(file_id, parsed, vec![], "DNA").await.unwrap();
        assert!(store.get_sequence_by_name("seqA".into()).await.unwrap().is_some());

        store.mark_file_deleted("/lib/a.fa".into()).await.unwrap();
        assert!(store.get_sequence_by_name("seqA".into()).await.unwrap().is_none());
    }
}
