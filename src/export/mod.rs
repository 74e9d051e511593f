//! The Exporters: deterministic outputs for the corpus (spec §4.6).

pub mod document;
pub mod jsonl;
pub mod pairs;
pub mod vault;

use crate::error::Result;
use crate::store::queries::get_conversation;
use crate::store::queries::get_messages;
use crate::store::Storage;

/// Render the per-conversation document for a single conversation id.
pub fn markdown(storage: &Storage, conversation_id: &str, redact: bool) -> Result<String> {
    let conversation = storage.with_connection(|conn| get_conversation(conn, conversation_id))?;
    let messages = storage.with_connection(|conn| get_messages(conn, conversation_id))?;
    Ok(document::render(&conversation, &messages, redact))
}

/// Training pairs for a single conversation id.
pub fn training_pairs(storage: &Storage, conversation_id: &str, redact: bool) -> Result<Vec<pairs::Pair>> {
    let messages = storage.with_connection(|conn| get_messages(conn, conversation_id))?;
    Ok(pairs::pairs(conversation_id, &messages, redact))
}
