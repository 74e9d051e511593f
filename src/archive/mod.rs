//! The Parser: reads a compressed export archive and yields normalized,
//! turn-linearized conversations (spec §4.1, §6).

mod parser;
mod raw;

pub use parser::{parse_conversation, ParsedConversation};

use std::io::Read;
use std::path::Path;

use crate::error::{ChronicleError, Result};
use crate::ingest::hash::canonical_sha256;

/// Candidate file names for the top-level conversation list inside the
/// archive, checked in order.
const CONVERSATIONS_FILE_CANDIDATES: &[&str] = &["conversations.json", "conversations_2025.json"];

#[derive(Debug, Default)]
pub struct ParseReport {
    pub conversations: Vec<ParsedConversation>,
    pub failed_records: i64,
}

/// Open the archive and parse every conversation record it contains.
/// A malformed record is skipped and counted rather than aborting the run
/// (spec §4.1 failure tolerance).
pub fn parse_archive(path: impl AsRef<Path>) -> Result<ParseReport> {
    let file = std::fs::File::open(path.as_ref())?;
    let mut zip = zip::ZipArchive::new(file)?;

    let name = CONVERSATIONS_FILE_CANDIDATES
        .iter()
        .find(|candidate| zip.by_name(candidate).is_ok())
        .ok_or_else(|| ChronicleError::Archive("archive has no conversations.json".to_string()))?;

    let mut contents = String::new();
    zip.by_name(name)?.read_to_string(&mut contents)?;

    parse_conversations_json(&contents)
}

/// Parse conversation records from an already-extracted JSON string. Split
/// out from [`parse_archive`] so callers (and tests) can bypass the zip
/// layer entirely.
pub fn parse_conversations_json(contents: &str) -> Result<ParseReport> {
    let records: Vec<serde_json::Value> = serde_json::from_str(contents)
        .map_err(|e| ChronicleError::Archive(format!("conversations.json is not a JSON array: {e}")))?;

    let mut report = ParseReport::default();
    for record in &records {
        match parse_record(record) {
            Ok(parsed) => report.conversations.push(parsed),
            Err(_) => report.failed_records += 1,
        }
    }
    Ok(report)
}

fn parse_record(record: &serde_json::Value) -> Result<ParsedConversation> {
    let raw_hash = canonical_sha256(record);
    parse_conversation(record, &raw_hash)
}
