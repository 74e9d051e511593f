//! The Chunker: builds overlapping, stably-identified chunks from persisted
//! messages (spec §4.4).
//!
//! Messages are concatenated in `turn_index` order behind role-prefixed
//! headers, then a sliding window of `target_size` characters, advanced by
//! `target_size - overlap` each step, is walked across that text. A chunk's
//! id is a pure function of its member range and the chunking parameters, so
//! re-chunking with the same configuration reproduces the same rows exactly.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::ingest::hash::sha256_hex;
use crate::store::queries::{get_messages, replace_chunks};
use crate::store::Storage;
use crate::types::{Chunk, Message};

/// Chunking parameters. Defaults follow the stated target: 2500 characters
/// per chunk with roughly 15% overlap between neighbors.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub target_size: i64,
    pub overlap: i64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_size: 2500,
            overlap: 375,
        }
    }
}

pub struct Chunker;

impl Chunker {
    /// (Re)chunk a conversation, replacing any chunks previously recorded for
    /// it. Returns the freshly written chunks in `start_turn` order.
    pub fn chunk(storage: &Storage, conversation_id: &str, config: ChunkConfig) -> Result<Vec<Chunk>> {
        let messages = storage.with_connection(|conn| get_messages(conn, conversation_id))?;
        let chunks = derive_chunks(conversation_id, &messages, config);
        storage.with_transaction(|tx| {
            replace_chunks(tx, conversation_id, &chunks, config.target_size, config.overlap)
        })?;
        Ok(chunks)
    }
}

struct Segment {
    turn_index: i64,
    start: usize,
    end: usize,
}

/// Pure function from a message list to a chunk set; has no database
/// dependency so it can be exercised directly in tests.
fn derive_chunks(conversation_id: &str, messages: &[Message], config: ChunkConfig) -> Vec<Chunk> {
    if messages.is_empty() {
        return Vec::new();
    }

    let mut full_text = String::new();
    let mut segments: Vec<Segment> = Vec::with_capacity(messages.len());

    for message in messages {
        if !full_text.is_empty() {
            full_text.push_str("\n\n");
        }
        let header = format!("### {}\n", message.role.as_str());
        let start = char_len(&full_text);
        full_text.push_str(&header);
        full_text.push_str(&message.content_text);
        let end = char_len(&full_text);
        segments.push(Segment {
            turn_index: message.turn_index,
            start,
            end,
        });
    }

    let chars: Vec<char> = full_text.chars().collect();
    let total = chars.len();
    let step = (config.target_size - config.overlap).max(1) as usize;
    let target = config.target_size.max(1) as usize;

    let mut out = Vec::new();
    let mut pos = 0usize;

    loop {
        let window_start = pos;
        let window_end = (pos + target).min(total);

        let contained: Vec<&Segment> = segments
            .iter()
            .filter(|s| s.start >= window_start && s.end <= window_end)
            .collect();

        if let (Some(first), Some(last)) = (contained.first(), contained.last()) {
            // The stored text spans the contained segments' own boundaries,
            // not the raw window, so it always begins and ends on a message
            // boundary rather than mid-header.
            push_chunk(&mut out, conversation_id, &chars, first, last, config);
            if window_end >= total {
                break;
            }
            pos += step;
        } else if let Some(next) = segments.iter().find(|s| s.start >= window_start) {
            // A single message longer than target_size never fits any
            // window whole; give it its own chunk so it is never dropped.
            push_chunk(&mut out, conversation_id, &chars, next, next, config);
            if next.end >= total {
                break;
            }
            pos = next.end;
        } else {
            break;
        }
    }

    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_chunk(
    out: &mut Vec<Chunk>,
    conversation_id: &str,
    chars: &[char],
    first: &Segment,
    last: &Segment,
    config: ChunkConfig,
) {
    let text: String = chars[first.start..last.end].iter().collect();
    let text_hash = sha256_hex(text.as_bytes());
    let id = chunk_id(
        conversation_id,
        first.turn_index,
        last.turn_index,
        config.target_size,
        config.overlap,
        &text_hash,
    );
    out.push(Chunk {
        id,
        conversation_id: conversation_id.to_string(),
        start_turn: first.turn_index,
        end_turn: last.turn_index,
        text,
        text_hash,
    });
}

fn chunk_id(
    conversation_id: &str,
    start_turn: i64,
    end_turn: i64,
    target_size: i64,
    overlap: i64,
    text_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(conversation_id.as_bytes());
    hasher.update(start_turn.to_le_bytes());
    hasher.update(end_turn.to_le_bytes());
    hasher.update(target_size.to_le_bytes());
    hasher.update(overlap.to_le_bytes());
    hasher.update(text_hash.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

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
    fn identical_parameters_reproduce_identical_ids() {
        let messages: Vec<Message> = (0..10)
            .map(|i| message(i, if i % 2 == 0 { Role::User } else { Role::Assistant }, &"x".repeat(800)))
            .collect();
        let config = ChunkConfig { target_size: 2500, overlap: 250 };
        let a = derive_chunks("c1", &messages, config);
        let b = derive_chunks("c1", &messages, config);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.text_hash, y.text_hash);
        }
        assert!(a.len() > 1, "expected more than one chunk for this input size");
    }

    #[test]
    fn changed_overlap_changes_ids() {
        let messages: Vec<Message> = (0..10)
            .map(|i| message(i, Role::User, &"x".repeat(800)))
            .collect();
        let a = derive_chunks("c1", &messages, ChunkConfig { target_size: 2500, overlap: 250 });
        let b = derive_chunks("c1", &messages, ChunkConfig { target_size: 2500, overlap: 500 });
        let ids_a: std::collections::HashSet<_> = a.iter().map(|c| c.id.clone()).collect();
        let ids_b: std::collections::HashSet<_> = b.iter().map(|c| c.id.clone()).collect();
        assert!(ids_a.is_disjoint(&ids_b));
    }

    #[test]
    fn every_chunk_spans_at_least_one_full_message() {
        let messages: Vec<Message> = (0..3).map(|i| message(i, Role::User, "short")).collect();
        let chunks = derive_chunks("c1", &messages, ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_turn, 0);
        assert_eq!(chunks[0].end_turn, 2);
    }

    #[test]
    fn empty_conversation_produces_no_chunks() {
        assert!(derive_chunks("c1", &[], ChunkConfig::default()).is_empty());
    }
}
