//! Wire shapes of a source conversation record, straight off the export's
//! `conversations.json` (spec §6). Kept separate from the persisted
//! [`crate::types`] model: this is what the archive says, not what gets
//! stored.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct RawConversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub update_time: Option<f64>,
    #[serde(default)]
    pub default_model_slug: Option<String>,
    #[serde(default)]
    pub gizmo_id: Option<String>,
    #[serde(default)]
    pub current_node: Option<String>,
    pub mapping: BTreeMap<String, RawNode>,

    /// Every other top-level field, preserved verbatim into `meta`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub message: Option<RawMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub content: Option<RawContent>,
    #[serde(default)]
    pub create_time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContent {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub parts: Vec<serde_json::Value>,
}
