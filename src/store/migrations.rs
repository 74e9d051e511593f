//! Database schema for chronicle.
//!
//! One migration per schema version, applied additively so an existing
//! database upgrades in place. FTS5 indexes `messages.content_text` and is
//! kept in sync via triggers rather than being repopulated by application
//! code (spec §4.3 invariant: "For every message row, an FTS row exists").

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i32 = 3;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < SCHEMA_VERSION {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// v1: conversations, messages, FTS5 index + sync triggers, ingest sentinel.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE conversations (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            message_count INTEGER NOT NULL DEFAULT 0,
            default_model_slug TEXT,
            gizmo_id TEXT,
            raw_hash TEXT NOT NULL,
            meta TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX idx_conversations_updated ON conversations(updated_at DESC);
        CREATE INDEX idx_conversations_gizmo ON conversations(gizmo_id);
        CREATE INDEX idx_conversations_raw_hash ON conversations(raw_hash);

        CREATE TABLE messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            conversation_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content_type TEXT NOT NULL,
            content_text TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            turn_index INTEGER NOT NULL,
            parent_id TEXT,
            text_hash TEXT NOT NULL,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
            UNIQUE (conversation_id, turn_index)
        );

        CREATE INDEX idx_messages_conversation ON messages(conversation_id, turn_index);

        -- Full-text search with BM25 ranking, external-content table over messages.
        CREATE VIRTUAL TABLE messages_fts USING fts5(
            content_text,
            content='messages',
            content_rowid='seq',
            tokenize='porter unicode61'
        );

        CREATE TRIGGER messages_ai AFTER INSERT ON messages BEGIN
            INSERT INTO messages_fts(rowid, content_text) VALUES (NEW.seq, NEW.content_text);
        END;

        CREATE TRIGGER messages_ad AFTER DELETE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content_text)
            VALUES ('delete', OLD.seq, OLD.content_text);
        END;

        CREATE TRIGGER messages_au AFTER UPDATE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, content_text)
            VALUES ('delete', OLD.seq, OLD.content_text);
            INSERT INTO messages_fts(rowid, content_text) VALUES (NEW.seq, NEW.content_text);
        END;

        -- Per-conversation sentinel: absence of a complete=1 row means a
        -- prior ingest attempt never finished and should be retried even if
        -- rows happen to already exist from a partially rolled-back run.
        CREATE TABLE ingest_log (
            conversation_id TEXT NOT NULL,
            raw_hash TEXT NOT NULL,
            ingested_at INTEGER NOT NULL,
            complete INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (conversation_id, raw_hash)
        );
        "#,
    )?;

    conn.execute(
        "INSERT INTO schema_version (version) VALUES (1)",
        [],
    )?;
    Ok(())
}

/// v2: chunks and a reserved (unpopulated) embeddings table for a future
/// vector index, plus projects and jobs.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE chunks (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            start_turn INTEGER NOT NULL,
            end_turn INTEGER NOT NULL,
            text TEXT NOT NULL,
            text_hash TEXT NOT NULL,
            target_size INTEGER NOT NULL,
            overlap INTEGER NOT NULL,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_chunks_conversation ON chunks(conversation_id);

        -- Reserved for a future embedding index; the core never writes to
        -- this table (spec §1 non-goals).
        CREATE TABLE embeddings (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
        );

        CREATE TABLE projects (
            gizmo_id TEXT PRIMARY KEY,
            gizmo_type TEXT NOT NULL,
            display_name TEXT NOT NULL
        );

        CREATE TABLE jobs (
            id TEXT PRIMARY KEY,
            job_type TEXT NOT NULL,
            target_id TEXT NOT NULL,
            target_name TEXT NOT NULL,
            pattern TEXT NOT NULL,
            status TEXT NOT NULL,
            progress TEXT,
            result_path TEXT,
            error TEXT,
            created_at INTEGER NOT NULL,
            started_at INTEGER,
            finished_at INTEGER,
            last_heartbeat_at INTEGER
        );

        CREATE INDEX idx_jobs_target_pattern ON jobs(target_id, pattern);
        CREATE INDEX idx_jobs_status ON jobs(status);
        "#,
    )?;

    conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
    Ok(())
}

/// v3: index to make the "at most one pending/running job per (target, pattern)"
/// invariant cheap to check.
fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE INDEX idx_jobs_active ON jobs(target_id, pattern, status);
        "#,
    )?;
    conn.execute("INSERT INTO schema_version (version) VALUES (3)", [])?;
    Ok(())
}
