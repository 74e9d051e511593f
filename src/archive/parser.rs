//! Linearization: turns a conversation's branching node map into the single
//! ordered sequence of turns the rest of the system works with (spec §4.1).

use super::raw::{RawConversation, RawContent};
use crate::error::{ChronicleError, Result};
use crate::ingest::hash::sha256_hex;
use crate::types::{Conversation, Message, Role};

pub struct ParsedConversation {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

pub fn parse_conversation(value: &serde_json::Value, raw_hash: &str) -> Result<ParsedConversation> {
    let raw: RawConversation = serde_json::from_value(value.clone())?;

    let path = select_path(&raw)?;
    let mut messages = Vec::new();
    let mut turn_index = 0i64;

    for node_id in &path {
        let node = match raw.mapping.get(node_id) {
            Some(n) => n,
            None => continue,
        };
        let message = match &node.message {
            Some(m) => m,
            None => continue,
        };

        let role: Role = message
            .author
            .as_ref()
            .and_then(|a| a.role.as_deref())
            .unwrap_or("unknown")
            .parse()
            .unwrap_or(Role::Unknown);

        let (content_type, content_text) = match &message.content {
            Some(content) => flatten_content(content),
            None => ("text".to_string(), String::new()),
        };

        if role == Role::System && content_text.is_empty() {
            continue;
        }

        let created_at = message.create_time.unwrap_or(0.0) as i64;
        let text_hash = sha256_hex(content_text.as_bytes());

        messages.push(Message {
            id: node.id.clone(),
            conversation_id: raw.id.clone(),
            role,
            content_type,
            content_text,
            created_at,
            turn_index,
            parent_id: node.parent.clone(),
            text_hash,
        });
        turn_index += 1;
    }

    let created_at = raw.create_time.unwrap_or(0.0) as i64;
    let updated_at = raw.update_time.unwrap_or(created_at as f64) as i64;

    let mut meta = serde_json::Map::new();
    for (k, v) in &raw.extra {
        if !matches!(k.as_str(), "id" | "title" | "create_time" | "update_time" | "default_model_slug" | "gizmo_id" | "current_node" | "mapping") {
            meta.insert(k.clone(), v.clone());
        }
    }

    let conversation = Conversation {
        id: raw.id.clone(),
        title: raw.title.clone().unwrap_or_default(),
        created_at,
        updated_at,
        message_count: messages.len() as i64,
        default_model_slug: raw.default_model_slug.clone(),
        gizmo_id: raw.gizmo_id.clone(),
        raw_hash: raw_hash.to_string(),
        meta: serde_json::Value::Object(meta),
    };

    Ok(ParsedConversation { conversation, messages })
}

/// Pick the ordered list of node ids from root to the selected leaf.
///
/// When `current_node` names a node present in the mapping, the path is the
/// chain of parents from that node back to the root. Otherwise the walk
/// proceeds forward from the root, at each branch choosing the child whose
/// message has the latest `create_time` (ties broken by the lexicographically
/// smallest child id).
fn select_path(raw: &RawConversation) -> Result<Vec<String>> {
    let root_id = raw
        .mapping
        .values()
        .find(|n| n.parent.is_none())
        .map(|n| n.id.clone())
        .or_else(|| raw.mapping.keys().next().cloned())
        .ok_or_else(|| ChronicleError::Archive(format!("conversation {} has an empty mapping", raw.id)))?;

    if let Some(current) = &raw.current_node {
        if raw.mapping.contains_key(current) {
            let mut path = Vec::new();
            let mut cursor = current.clone();
            loop {
                path.push(cursor.clone());
                match raw.mapping.get(&cursor).and_then(|n| n.parent.clone()) {
                    Some(parent) if raw.mapping.contains_key(&parent) => cursor = parent,
                    _ => break,
                }
            }
            path.reverse();
            return Ok(path);
        }
    }

    let mut path = Vec::new();
    let mut cursor = root_id;
    loop {
        path.push(cursor.clone());
        let node = match raw.mapping.get(&cursor) {
            Some(n) => n,
            None => break,
        };
        if node.children.is_empty() {
            break;
        }

        let mut best: Option<&String> = None;
        let mut best_time = f64::MIN;
        for child_id in &node.children {
            let t = raw
                .mapping
                .get(child_id)
                .and_then(|n| n.message.as_ref())
                .and_then(|m| m.create_time)
                .unwrap_or(0.0);
            let replace = match best {
                None => true,
                Some(b) => t > best_time || (t == best_time && child_id < b),
            };
            if replace {
                best = Some(child_id);
                best_time = t;
            }
        }
        cursor = match best {
            Some(b) => b.clone(),
            None => break,
        };
    }
    Ok(path)
}

/// Join content parts with a blank line; non-text content is prefixed with a
/// `[content_type: <kind>]` marker. Trailing whitespace is trimmed per line.
fn flatten_content(content: &RawContent) -> (String, String) {
    let content_type = content.content_type.clone().unwrap_or_else(|| "text".to_string());

    let pieces: Vec<String> = content
        .parts
        .iter()
        .filter_map(part_to_text)
        .filter(|p| !p.is_empty())
        .collect();
    let body = pieces.join("\n\n");

    let text = if content_type == "text" {
        body
    } else if body.is_empty() {
        format!("[content_type: {content_type}]")
    } else {
        format!("[content_type: {content_type}]\n{body}")
    };

    let trimmed: String = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    (content_type, trimmed)
}

fn part_to_text(part: &serde_json::Value) -> Option<String> {
    match part {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(obj) => obj
            .get("text")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(current_node: Option<&str>) -> serde_json::Value {
        json!({
            "id": "conv1",
            "title": "Hi",
            "create_time": 100.0,
            "update_time": 200.0,
            "current_node": current_node,
            "mapping": {
                "root": {"id": "root", "parent": null, "children": ["n1"], "message": null},
                "n1": {
                    "id": "n1", "parent": "root", "children": ["n2"],
                    "message": {"author": {"role": "user"}, "content": {"content_type": "text", "parts": ["hello"]}, "create_time": 101.0}
                },
                "n2": {
                    "id": "n2", "parent": "n1", "children": [],
                    "message": {"author": {"role": "assistant"}, "content": {"content_type": "text", "parts": ["hi there"]}, "create_time": 102.0}
                }
            }
        })
    }

    #[test]
    fn linearizes_simple_chain() {
        let parsed = parse_conversation(&sample(None), "h1").unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[0].turn_index, 0);
        assert_eq!(parsed.messages[0].role, Role::User);
        assert_eq!(parsed.messages[1].turn_index, 1);
        assert_eq!(parsed.messages[1].role, Role::Assistant);
        assert_eq!(parsed.conversation.message_count, 2);
    }

    #[test]
    fn follows_current_node_over_latest_branch() {
        let mut value = sample(None);
        value["mapping"]["n1"]["children"] = json!(["n2", "n3"]);
        value["mapping"]["n3"] = json!({
            "id": "n3", "parent": "n1", "children": [],
            "message": {"author": {"role": "assistant"}, "content": {"content_type": "text", "parts": ["branch b"]}, "create_time": 50.0}
        });
        value["current_node"] = json!("n3");

        let parsed = parse_conversation(&value, "h2").unwrap();
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[1].content_text, "branch b");
    }

    #[test]
    fn picks_latest_timestamped_child_without_current_node() {
        let mut value = sample(None);
        value["mapping"]["n1"]["children"] = json!(["n2", "n3"]);
        value["mapping"]["n3"] = json!({
            "id": "n3", "parent": "n1", "children": [],
            "message": {"author": {"role": "assistant"}, "content": {"content_type": "text", "parts": ["later"]}, "create_time": 999.0}
        });

        let parsed = parse_conversation(&value, "h3").unwrap();
        assert_eq!(parsed.messages[1].content_text, "later");
    }

    #[test]
    fn empty_system_messages_are_skipped() {
        let mut value = sample(None);
        value["mapping"]["n1"]["message"]["author"]["role"] = json!("system");
        value["mapping"]["n1"]["message"]["content"]["parts"] = json!([""]);

        let parsed = parse_conversation(&value, "h4").unwrap();
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.messages[0].role, Role::Assistant);
        assert_eq!(parsed.messages[0].turn_index, 0);
    }

    #[test]
    fn non_text_content_gets_kind_marker() {
        let mut value = sample(None);
        value["mapping"]["n1"]["message"]["content"] =
            json!({"content_type": "code", "parts": ["print(1)"]});

        let parsed = parse_conversation(&value, "h5").unwrap();
        assert_eq!(parsed.messages[0].content_text, "[content_type: code]\nprint(1)");
    }

    #[test]
    fn unknown_top_level_fields_land_in_meta() {
        let mut value = sample(None);
        value["conversation_template_id"] = json!("tpl_1");

        let parsed = parse_conversation(&value, "h6").unwrap();
        assert_eq!(
            parsed.conversation.meta.get("conversation_template_id"),
            Some(&json!("tpl_1"))
        );
    }
}
