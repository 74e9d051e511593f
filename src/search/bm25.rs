//! FTS5/BM25 full-text search over `messages.content_text`, with a
//! case-insensitive substring fallback when the query cannot be parsed by
//! the FTS5 query compiler (spec §4.3, §4.5, §9).

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::store::queries::message_from_row;
use crate::types::{Role, SearchHit};

/// Run a search. Tries bm25-ranked FTS5 first; on a query-syntax error from
/// SQLite, falls back to substring matching ordered by recency. The fallback
/// never surfaces as an error to the caller (spec §4.3, §7).
pub fn search(conn: &Connection, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
    match bm25_search(conn, query, limit) {
        Ok(hits) => Ok(hits),
        Err(_) => substring_search(conn, query, limit),
    }
}

fn bm25_search(conn: &Connection, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
    let escaped = escape_fts5_query(query);
    if escaped.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT m.*, bm25(messages_fts) AS rank
         FROM messages_fts
         JOIN messages m ON m.seq = messages_fts.rowid
         WHERE messages_fts MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![escaped, limit], |row| {
        let message = message_from_row(row)?;
        let rank: f64 = row.get("rank")?;
        Ok((message, rank))
    })?;

    let mut hits = Vec::new();
    for row in rows {
        let (message, rank) = row?;
        hits.push(SearchHit {
            message_id: message.id,
            conversation_id: message.conversation_id,
            role: message.role,
            snippet: snippet(&message.content_text, query),
            created_at: message.created_at,
            rank,
        });
    }
    Ok(hits)
}

fn substring_search(conn: &Connection, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
    let needle = format!("%{}%", query.replace('%', "").replace('_', ""));
    let mut stmt = conn.prepare(
        "SELECT * FROM messages
         WHERE content_text LIKE ?1 ESCAPE '\\'
         ORDER BY created_at DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![needle, limit], message_from_row)?;

    let mut hits = Vec::new();
    for row in rows {
        let message = row?;
        hits.push(SearchHit {
            message_id: message.id,
            conversation_id: message.conversation_id,
            role: message.role,
            snippet: snippet(&message.content_text, query),
            created_at: message.created_at,
            rank: 0.0,
        });
    }
    Ok(hits)
}

/// A short excerpt around the first case-insensitive occurrence of any query
/// token, for display; falls back to a leading truncation.
fn snippet(text: &str, query: &str) -> String {
    const RADIUS: usize = 80;
    let lower_text = text.to_lowercase();
    let first_token = query.split_whitespace().next().unwrap_or(query).to_lowercase();

    if !first_token.is_empty() {
        if let Some(pos) = lower_text.find(&first_token) {
            let start = pos.saturating_sub(RADIUS);
            let end = (pos + first_token.len() + RADIUS).min(text.len());
            let start = floor_char_boundary(text, start);
            let end = ceil_char_boundary(text, end);
            return text[start..end].trim().to_string();
        }
    }

    let end = ceil_char_boundary(text, RADIUS.min(text.len()) * 2);
    text[..end].trim().to_string()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Escape a free-form query into a safe FTS5 MATCH expression.
///
/// FTS5 special characters and operators (`"`, `*`, `(`, `)`, `:`, `^`, `+`,
/// `-`, and the keywords `AND`/`OR`/`NOT`/`NEAR`) are quoted per-term so user
/// input can never be interpreted as query syntax.
fn escape_fts5_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() > 2 {
        let inner = &trimmed[1..trimmed.len() - 1];
        return format!("\"{}\"", inner.replace('"', "\"\""));
    }

    trimmed
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(escape_fts5_term)
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_fts5_term(term: &str) -> String {
    if term.is_empty() {
        return String::new();
    }

    let special = ['"', '*', '(', ')', '{', '}', '[', ']', '^', '~', ':', '+', '-'];
    let needs_quotes = term.chars().any(|c| special.contains(&c) || c.is_whitespace());
    let is_operator = matches!(term, "AND" | "OR" | "NOT" | "NEAR");

    if needs_quotes || is_operator {
        let mut escaped = String::with_capacity(term.len() + 2);
        escaped.push('"');
        for c in term.chars() {
            if c == '"' {
                escaped.push_str("\"\"");
            } else {
                escaped.push(c);
            }
        }
        escaped.push('"');
        escaped
    } else {
        term.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::queries::{insert_message, upsert_conversation};
    use crate::store::Storage;
    use crate::types::Conversation;

    fn seed(storage: &Storage) {
        storage
            .with_transaction(|tx| {
                upsert_conversation(
                    tx,
                    &Conversation {
                        id: "c1".to_string(),
                        title: "t".to_string(),
                        created_at: 0,
                        updated_at: 0,
                        message_count: 2,
                        default_model_slug: None,
                        gizmo_id: None,
                        raw_hash: "h".to_string(),
                        meta: serde_json::json!({}),
                    },
                )?;
                insert_message(
                    tx,
                    &crate::types::Message {
                        id: "m0".to_string(),
                        conversation_id: "c1".to_string(),
                        role: Role::User,
                        content_type: "text".to_string(),
                        content_text: "hi".to_string(),
                        created_at: 0,
                        turn_index: 0,
                        parent_id: None,
                        text_hash: "h0".to_string(),
                    },
                )?;
                insert_message(
                    tx,
                    &crate::types::Message {
                        id: "m1".to_string(),
                        conversation_id: "c1".to_string(),
                        role: Role::Assistant,
                        content_type: "text".to_string(),
                        content_text: "hello there".to_string(),
                        created_at: 1,
                        turn_index: 1,
                        parent_id: None,
                        text_hash: "h1".to_string(),
                    },
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn bm25_finds_matching_message() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);
        let hits = storage.with_connection(|conn| search(conn, "hello", 10)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "m1");
    }

    #[test]
    fn substring_search_matches_case_insensitively() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);
        let hits = storage
            .with_connection(|conn| substring_search(conn, "ELLO", 10))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "m1");
    }

    #[test]
    fn escape_quotes_injection_attempts() {
        assert_eq!(escape_fts5_query("hello OR (drop table)"), "hello \"OR\" \"(drop\" \"table)\"");
        assert_eq!(escape_fts5_query("content:malicious"), "\"content:malicious\"");
    }
}
