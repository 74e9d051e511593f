//! Vault directory export: one document file per conversation (spec §4.6).

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::export::document;
use crate::store::queries::{get_messages, list_conversations};
use crate::store::Storage;
use crate::types::ConversationListOptions;

/// Write one document per conversation into `dir`, filenames derived from a
/// sanitized title and a short id prefix so re-running produces the same
/// file set.
pub fn export(storage: &Storage, dir: &Path, redact: bool) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let conversations = storage.with_connection(|conn| {
        list_conversations(
            conn,
            &ConversationListOptions {
                limit: i64::MAX,
                offset: 0,
                title_contains: None,
                gizmo_id: None,
            },
        )
    })?;

    let mut written = Vec::new();
    for conversation in &conversations {
        let messages = storage.with_connection(|conn| get_messages(conn, &conversation.id))?;
        let doc = document::render(conversation, &messages, redact);
        let filename = filename_for(conversation);
        let path = dir.join(filename);
        std::fs::write(&path, doc)?;
        written.push(path);
    }

    Ok(written)
}

fn filename_for(conversation: &crate::types::Conversation) -> String {
    let short_id: String = conversation.id.chars().take(8).collect();
    format!("{}-{}.md", sanitize_title(&conversation.title), short_id)
}

fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::queries::{insert_message, upsert_conversation};
    use crate::types::{Conversation, Message, Role};

    #[test]
    fn writes_one_file_per_conversation_with_stable_name() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_transaction(|tx| {
                upsert_conversation(
                    tx,
                    &Conversation {
                        id: "abcdefgh-0000".to_string(),
                        title: "My Chat!".to_string(),
                        created_at: 0,
                        updated_at: 0,
                        message_count: 1,
                        default_model_slug: None,
                        gizmo_id: None,
                        raw_hash: "h".to_string(),
                        meta: serde_json::json!({}),
                    },
                )?;
                insert_message(
                    tx,
                    &Message {
                        id: "m0".to_string(),
                        conversation_id: "abcdefgh-0000".to_string(),
                        role: Role::User,
                        content_type: "text".to_string(),
                        content_text: "hi".to_string(),
                        created_at: 0,
                        turn_index: 0,
                        parent_id: None,
                        text_hash: "h0".to_string(),
                    },
                )?;
                Ok(())
            })
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let first = export(&storage, dir.path(), false).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].file_name().unwrap(), "my_chat-abcdefgh.md");

        let second = export(&storage, dir.path(), false).unwrap();
        assert_eq!(first, second);
    }
}
