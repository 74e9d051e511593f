//! Bulk message export: one JSON object per line (spec §4.6).

use serde::Serialize;

use crate::error::Result;
use crate::ingest::redact::Redactor;
use crate::store::queries::all_messages;
use crate::store::Storage;

#[derive(Debug, Serialize)]
struct Record {
    id: String,
    conversation_id: String,
    role: String,
    content_text: String,
    created_at: i64,
    turn_index: i64,
}

/// Stream every message as newline-delimited JSON, ordered by
/// `(conversation_id, turn_index)`.
pub fn export(storage: &Storage, redact: bool) -> Result<String> {
    let messages = storage.with_connection(all_messages)?;
    let mut redactor = Redactor::new();
    let mut out = String::new();

    for message in &messages {
        let content_text = if redact {
            redactor.redact(&message.content_text)
        } else {
            message.content_text.clone()
        };
        let record = Record {
            id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            role: message.role.as_str().to_string(),
            content_text,
            created_at: message.created_at,
            turn_index: message.turn_index,
        };
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }

    Ok(out)
}
