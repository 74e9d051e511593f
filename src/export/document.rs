//! Per-conversation document rendering (spec §4.6), shared by the markdown
//! export endpoint and the vault exporter.

use crate::ingest::redact::Redactor;
use crate::types::{Conversation, Message};

/// Render a conversation as a structured text document: a title heading
/// followed by one role heading per message, in `turn_index` order.
pub fn render(conversation: &Conversation, messages: &[Message], redact: bool) -> String {
    let mut redactor = Redactor::new();
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", conversation.title));

    for message in messages {
        let text = if redact {
            redactor.redact(&message.content_text)
        } else {
            message.content_text.clone()
        };
        out.push_str(&format!("## {}\n\n{}\n\n", message.role, text));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn conversation() -> Conversation {
        Conversation {
            id: "c1".to_string(),
            title: "Hello".to_string(),
            created_at: 0,
            updated_at: 0,
            message_count: 2,
            default_model_slug: None,
            gizmo_id: None,
            raw_hash: "h".to_string(),
            meta: serde_json::json!({}),
        }
    }

    fn messages() -> Vec<Message> {
        vec![
            Message {
                id: "m0".to_string(),
                conversation_id: "c1".to_string(),
                role: Role::User,
                content_type: "text".to_string(),
                content_text: "email me at a@b.com".to_string(),
                created_at: 0,
                turn_index: 0,
                parent_id: None,
                text_hash: "h0".to_string(),
            },
            Message {
                id: "m1".to_string(),
                conversation_id: "c1".to_string(),
                role: Role::Assistant,
                content_type: "text".to_string(),
                content_text: "sure thing".to_string(),
                created_at: 1,
                turn_index: 1,
                parent_id: None,
                text_hash: "h1".to_string(),
            },
        ]
    }

    #[test]
    fn renders_title_and_role_headings_in_order() {
        let doc = render(&conversation(), &messages(), false);
        let title_pos = doc.find("# Hello").unwrap();
        let user_pos = doc.find("## user").unwrap();
        let assistant_pos = doc.find("## assistant").unwrap();
        assert!(title_pos < user_pos);
        assert!(user_pos < assistant_pos);
        assert!(doc.contains("a@b.com"));
    }

    #[test]
    fn redaction_toggle_scrubs_pii() {
        let doc = render(&conversation(), &messages(), true);
        assert!(!doc.contains("a@b.com"));
        assert!(doc.contains("[REDACTED_EMAIL_1]"));
    }

    #[test]
    fn output_is_deterministic_across_runs() {
        let a = render(&conversation(), &messages(), false);
        let b = render(&conversation(), &messages(), false);
        assert_eq!(a, b);
    }
}
