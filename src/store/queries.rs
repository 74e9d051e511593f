//! Database queries: CRUD for conversations, messages, chunks, projects and jobs.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{ChronicleError, Result};
use crate::types::*;

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

pub fn conversation_from_row(row: &Row) -> rusqlite::Result<Conversation> {
    let meta_str: String = row.get("meta")?;
    Ok(Conversation {
        id: row.get("id")?,
        title: row.get("title")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        message_count: row.get("message_count")?,
        default_model_slug: row.get("default_model_slug")?,
        gizmo_id: row.get("gizmo_id")?,
        raw_hash: row.get("raw_hash")?,
        meta: serde_json::from_str(&meta_str).unwrap_or(serde_json::Value::Null),
    })
}

/// Insert or fully replace a conversation row (force re-import deletes first).
pub fn upsert_conversation(conn: &Connection, c: &Conversation) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations
            (id, title, created_at, updated_at, message_count, default_model_slug, gizmo_id, raw_hash, meta)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            c.id,
            c.title,
            c.created_at,
            c.updated_at,
            c.message_count,
            c.default_model_slug,
            c.gizmo_id,
            c.raw_hash,
            c.meta.to_string(),
        ],
    )?;
    Ok(())
}

/// Delete a conversation and everything derived from it (messages cascade via
/// FK, chunks cascade via FK). Used by forced re-import.
pub fn delete_conversation(conn: &Connection, conversation_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM conversations WHERE id = ?1",
        params![conversation_id],
    )?;
    Ok(())
}

pub fn get_conversation(conn: &Connection, id: &str) -> Result<Conversation> {
    conn.query_row(
        "SELECT * FROM conversations WHERE id = ?1",
        params![id],
        conversation_from_row,
    )
    .optional()?
    .ok_or_else(|| ChronicleError::NotFound(format!("conversation {id}")))
}

pub fn conversation_by_raw_hash(
    conn: &Connection,
    id: &str,
    raw_hash: &str,
) -> Result<Option<Conversation>> {
    Ok(conn
        .query_row(
            "SELECT * FROM conversations WHERE id = ?1 AND raw_hash = ?2",
            params![id, raw_hash],
            conversation_from_row,
        )
        .optional()?)
}

pub fn list_conversations(
    conn: &Connection,
    opts: &ConversationListOptions,
) -> Result<Vec<Conversation>> {
    let mut sql = String::from("SELECT * FROM conversations WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(title) = &opts.title_contains {
        sql.push_str(" AND title LIKE ?");
        params_vec.push(Box::new(format!("%{title}%")));
    }
    if let Some(gizmo_id) = &opts.gizmo_id {
        sql.push_str(" AND gizmo_id = ?");
        params_vec.push(Box::new(gizmo_id.clone()));
    }
    sql.push_str(" ORDER BY updated_at DESC LIMIT ? OFFSET ?");
    let limit = if opts.limit > 0 { opts.limit } else { 50 };
    params_vec.push(Box::new(limit));
    params_vec.push(Box::new(opts.offset));

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), conversation_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    let role_str: String = row.get("role")?;
    Ok(Message {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        role: role_str.parse().unwrap_or(Role::Unknown),
        content_type: row.get("content_type")?,
        content_text: row.get("content_text")?,
        created_at: row.get("created_at")?,
        turn_index: row.get("turn_index")?,
        parent_id: row.get("parent_id")?,
        text_hash: row.get("text_hash")?,
    })
}

pub fn insert_message(conn: &Connection, m: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages
            (id, conversation_id, role, content_type, content_text, created_at, turn_index, parent_id, text_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            m.id,
            m.conversation_id,
            m.role.as_str(),
            m.content_type,
            m.content_text,
            m.created_at,
            m.turn_index,
            m.parent_id,
            m.text_hash,
        ],
    )?;
    Ok(())
}

pub fn get_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY turn_index ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], message_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Every message across every conversation, ordered for the bulk JSONL
/// export (`(conversation_id, turn_index)`, spec §4.6).
pub fn all_messages(conn: &Connection) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM messages ORDER BY conversation_id ASC, turn_index ASC",
    )?;
    let rows = stmt.query_map([], message_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

pub fn chunk_from_row(row: &Row) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        start_turn: row.get("start_turn")?,
        end_turn: row.get("end_turn")?,
        text: row.get("text")?,
        text_hash: row.get("text_hash")?,
    })
}

pub fn replace_chunks(
    conn: &Connection,
    conversation_id: &str,
    chunks: &[Chunk],
    target_size: i64,
    overlap: i64,
) -> Result<()> {
    conn.execute(
        "DELETE FROM chunks WHERE conversation_id = ?1",
        params![conversation_id],
    )?;
    for chunk in chunks {
        conn.execute(
            "INSERT INTO chunks (id, conversation_id, start_turn, end_turn, text, text_hash, target_size, overlap)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                chunk.id,
                chunk.conversation_id,
                chunk.start_turn,
                chunk.end_turn,
                chunk.text,
                chunk.text_hash,
                target_size,
                overlap,
            ],
        )?;
    }
    Ok(())
}

pub fn list_chunks(conn: &Connection, conversation_id: &str) -> Result<Vec<Chunk>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM chunks WHERE conversation_id = ?1 ORDER BY start_turn ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], chunk_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

pub fn upsert_project(conn: &Connection, p: &Project) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (gizmo_id, gizmo_type, display_name)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(gizmo_id) DO UPDATE SET display_name = excluded.display_name",
        params![p.gizmo_id, p.gizmo_type.as_str(), p.display_name],
    )?;
    Ok(())
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt = conn.prepare(
        "SELECT p.gizmo_id, p.gizmo_type, p.display_name,
                (SELECT COUNT(*) FROM conversations c WHERE c.gizmo_id = p.gizmo_id) AS conversation_count
         FROM projects p
         ORDER BY p.display_name ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let gizmo_type_str: String = row.get("gizmo_type")?;
        Ok(Project {
            gizmo_id: row.get("gizmo_id")?,
            gizmo_type: gizmo_type_str.parse().unwrap_or(GizmoType::Gpt),
            display_name: row.get("display_name")?,
            conversation_count: row.get("conversation_count")?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn conversations_for_gizmo(conn: &Connection, gizmo_id: &str) -> Result<Vec<Conversation>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM conversations WHERE gizmo_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![gizmo_id], conversation_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Ingest sentinel (crash-resumability, spec §9)
// ---------------------------------------------------------------------------

pub fn ingest_log_is_complete(conn: &Connection, conversation_id: &str, raw_hash: &str) -> Result<bool> {
    let complete: Option<i64> = conn
        .query_row(
            "SELECT complete FROM ingest_log WHERE conversation_id = ?1 AND raw_hash = ?2",
            params![conversation_id, raw_hash],
            |r| r.get(0),
        )
        .optional()?;
    Ok(complete == Some(1))
}

pub fn mark_ingest_complete(
    conn: &Connection,
    conversation_id: &str,
    raw_hash: &str,
    ingested_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO ingest_log (conversation_id, raw_hash, ingested_at, complete)
         VALUES (?1, ?2, ?3, 1)
         ON CONFLICT(conversation_id, raw_hash) DO UPDATE SET ingested_at = excluded.ingested_at, complete = 1",
        params![conversation_id, raw_hash, ingested_at],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

pub fn job_from_row(row: &Row) -> rusqlite::Result<Job> {
    let job_type_str: String = row.get("job_type")?;
    let status_str: String = row.get("status")?;
    let progress_str: Option<String> = row.get("progress")?;
    Ok(Job {
        id: row.get("id")?,
        job_type: job_type_str.parse().unwrap_or(JobType::Conversation),
        target_id: row.get("target_id")?,
        target_name: row.get("target_name")?,
        pattern: row.get("pattern")?,
        status: status_str.parse().unwrap_or(JobStatus::Failed),
        progress: progress_str.and_then(|s| serde_json::from_str(&s).ok()),
        result_path: row.get("result_path")?,
        error: row.get("error")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        last_heartbeat_at: row.get("last_heartbeat_at")?,
    })
}

pub fn insert_job(conn: &Connection, job: &Job) -> Result<()> {
    conn.execute(
        "INSERT INTO jobs
            (id, job_type, target_id, target_name, pattern, status, progress, result_path, error,
             created_at, started_at, finished_at, last_heartbeat_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            job.id,
            job.job_type.as_str(),
            job.target_id,
            job.target_name,
            job.pattern,
            job.status.as_str(),
            job.progress.as_ref().map(|p| serde_json::to_string(p).unwrap()),
            job.result_path,
            job.error,
            job.created_at,
            job.started_at,
            job.finished_at,
            job.last_heartbeat_at,
        ],
    )?;
    Ok(())
}

pub fn get_job(conn: &Connection, id: &str) -> Result<Job> {
    conn.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], job_from_row)
        .optional()?
        .ok_or_else(|| ChronicleError::NotFound(format!("job {id}")))
}

pub fn get_job_opt(conn: &Connection, id: &str) -> Result<Option<Job>> {
    Ok(conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], job_from_row)
        .optional()?)
}

/// The most recent job for `(target_id, pattern)` in a `done` state, if any.
pub fn latest_done_job(conn: &Connection, target_id: &str, pattern: &str) -> Result<Option<Job>> {
    Ok(conn
        .query_row(
            "SELECT * FROM jobs WHERE target_id = ?1 AND pattern = ?2 AND status = 'done'
             ORDER BY finished_at DESC LIMIT 1",
            params![target_id, pattern],
            job_from_row,
        )
        .optional()?)
}

/// A non-terminal job for `(target_id, pattern)`, if one is in flight.
pub fn active_job(conn: &Connection, target_id: &str, pattern: &str) -> Result<Option<Job>> {
    Ok(conn
        .query_row(
            "SELECT * FROM jobs WHERE target_id = ?1 AND pattern = ?2
             AND status IN ('pending', 'running') LIMIT 1",
            params![target_id, pattern],
            job_from_row,
        )
        .optional()?)
}

pub fn transition_job_running(conn: &Connection, id: &str, started_at: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE jobs SET status = 'running', started_at = ?2, last_heartbeat_at = ?2
         WHERE id = ?1 AND status = 'pending'",
        params![id, started_at],
    )?;
    if updated == 0 {
        return Err(ChronicleError::Conflict(format!(
            "job {id} was not pending"
        )));
    }
    Ok(())
}

pub fn update_job_progress(
    conn: &Connection,
    id: &str,
    progress: &JobProgress,
    heartbeat_at: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET progress = ?2, last_heartbeat_at = ?3 WHERE id = ?1",
        params![id, serde_json::to_string(progress)?, heartbeat_at],
    )?;
    Ok(())
}

pub fn transition_job_done(
    conn: &Connection,
    id: &str,
    result_path: &str,
    finished_at: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = 'done', result_path = ?2, finished_at = ?3 WHERE id = ?1",
        params![id, result_path, finished_at],
    )?;
    Ok(())
}

pub fn transition_job_failed(
    conn: &Connection,
    id: &str,
    error: &str,
    finished_at: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = 'failed', error = ?2, finished_at = ?3 WHERE id = ?1",
        params![id, error, finished_at],
    )?;
    Ok(())
}

pub fn delete_job(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(())
}

/// Jobs stuck in `pending`/`running` whose heartbeat is older than `cutoff`
/// (epoch seconds), or that never recorded one at all.
pub fn stale_jobs(conn: &Connection, cutoff: i64) -> Result<Vec<Job>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM jobs WHERE status IN ('pending', 'running')
         AND (last_heartbeat_at IS NULL OR last_heartbeat_at < ?1)",
    )?;
    let rows = stmt.query_map(params![cutoff], job_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let conversations: i64 = conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?;
    let messages: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
    let chunks: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
    let projects: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))?;
    Ok(Stats {
        conversations,
        messages,
        chunks,
        projects,
    })
}
