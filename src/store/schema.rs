//! Index store schema (C3). SQLite in place of the original's Postgres
//! schema — see `SPEC_FULL.md` §9 for why rusqlite was kept as the
//! backing engine and why trigram scoring moved into Rust (`store::fuzzy`)
//! instead of a `pg_trgm`-style SQL extension.

use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS indexed_files (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path   TEXT NOT NULL UNIQUE,
            file_hash   TEXT NOT NULL,
            format      TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'active',
            error_msg   TEXT,
            file_size   INTEGER NOT NULL,
            file_mtime  TEXT NOT NULL,
            indexed_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sequences (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id     INTEGER NOT NULL REFERENCES indexed_files(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            size_bp     INTEGER NOT NULL,
            topology    TEXT NOT NULL,
            sequence    TEXT NOT NULL,
            description TEXT,
            meta        TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_sequences_file ON sequences(file_id);
        CREATE INDEX IF NOT EXISTS idx_sequences_name ON sequences(name);

        CREATE TABLE IF NOT EXISTS features (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            seq_id      INTEGER NOT NULL REFERENCES sequences(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            type        TEXT NOT NULL,
            start       INTEGER NOT NULL,
            end         INTEGER NOT NULL,
            strand      INTEGER NOT NULL,
            qualifiers  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_features_seq ON features(seq_id);
        CREATE INDEX IF NOT EXISTS idx_features_type ON features(type);
        CREATE INDEX IF NOT EXISTS idx_features_name ON features(name);

        CREATE TABLE IF NOT EXISTS primers (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            seq_id      INTEGER NOT NULL REFERENCES sequences(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            sequence    TEXT NOT NULL,
            tm          REAL,
            start       INTEGER,
            end         INTEGER,
            strand      INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_primers_seq ON primers(seq_id);

        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE,
            token       TEXT NOT NULL UNIQUE,
            preferences TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS feedback (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            chat_id     TEXT,
            rating      TEXT NOT NULL,
            priority    INTEGER NOT NULL DEFAULT 3,
            comment     TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_feedback_user ON feedback(user_id);

        CREATE TABLE IF NOT EXISTS tool_approvals (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            filename    TEXT NOT NULL UNIQUE,
            file_hash   TEXT NOT NULL,
            tool_name   TEXT,
            status      TEXT NOT NULL DEFAULT 'quarantined',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            reviewed_at TEXT
        );
        "#,
    )
}
