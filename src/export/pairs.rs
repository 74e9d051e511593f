//! Training-pairs export: contiguous user→assistant adjacency (spec §4.6).

use serde::Serialize;

use crate::ingest::redact::Redactor;
use crate::types::{Message, Role};

#[derive(Debug, Serialize, PartialEq)]
pub struct Pair {
    pub a: String,
    pub b: String,
    pub meta: PairMeta,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PairMeta {
    pub conversation_id: String,
    pub pair_index: i64,
}

/// Emit one `Pair` per adjacent user→assistant turn. Any other role between
/// them (tool, system) breaks the adjacency, so a user turn followed by a
/// tool turn followed by an assistant turn yields no pair.
pub fn pairs(conversation_id: &str, messages: &[Message], redact: bool) -> Vec<Pair> {
    let mut redactor = Redactor::new();
    let mut out = Vec::new();
    let mut pair_index = 0i64;

    let mut iter = messages.windows(2);
    while let Some([a, b]) = iter.next() {
        if a.role == Role::User && b.role == Role::Assistant {
            let (a_text, b_text) = if redact {
                (redactor.redact(&a.content_text), redactor.redact(&b.content_text))
            } else {
                (a.content_text.clone(), b.content_text.clone())
            };
            out.push(Pair {
                a: a_text,
                b: b_text,
                meta: PairMeta {
                    conversation_id: conversation_id.to_string(),
                    pair_index,
                },
            });
            pair_index += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(turn_index: i64, role: Role, text: &str) -> Message {
        Message {
            id: format!("m{turn_index}"),
            conversation_id: "c1".to_string(),
            role,
            content_type: "text".to_string(),
            content_text: text.to_string(),
            created_at: turn_index,
            turn_index,
            parent_id: None,
            text_hash: format!("h{turn_index}"),
        }
    }

    #[test]
    fn emits_k_pairs_for_k_adjacent_turns() {
        let messages = vec![
            message(0, Role::User, "q1"),
            message(1, Role::Assistant, "a1"),
            message(2, Role::User, "q2"),
            message(3, Role::Assistant, "a2"),
        ];
        let out = pairs("c1", &messages, false);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].a, "q1");
        assert_eq!(out[0].b, "a1");
        assert_eq!(out[0].meta.pair_index, 0);
        assert_eq!(out[1].meta.pair_index, 1);
    }

    #[test]
    fn tool_turn_breaks_adjacency() {
        let messages = vec![
            message(0, Role::User, "q1"),
            message(1, Role::Tool, "tool output"),
            message(2, Role::Assistant, "a1"),
        ];
        let out = pairs("c1", &messages, false);
        assert!(out.is_empty());
    }
}
