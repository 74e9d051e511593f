//! Core data model shared across store, ingest, chunk, search, export and jobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single conversation, as persisted after linearization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub message_count: i64,
    pub default_model_slug: Option<String>,
    pub gizmo_id: Option<String>,
    pub raw_hash: String,
    /// Unknown top-level fields from the source record, preserved but not indexed.
    pub meta: serde_json::Value,
}

/// Author role of a message, folded from the export's free-form author field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
            Role::Unknown => "unknown",
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "tool" => Role::Tool,
            _ => Role::Unknown,
        })
    }
}

/// One turn in a linearized conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content_type: String,
    pub content_text: String,
    pub created_at: i64,
    pub turn_index: i64,
    pub parent_id: Option<String>,
    pub text_hash: String,
}

/// A contiguous, overlapping window of conversation text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub conversation_id: String,
    pub start_turn: i64,
    pub end_turn: i64,
    pub text: String,
    pub text_hash: String,
}

/// The kind of grouping identifier a gizmo_id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GizmoType {
    Snorlax,
    Gpt,
}

impl GizmoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GizmoType::Snorlax => "snorlax",
            GizmoType::Gpt => "gpt",
        }
    }
}

impl FromStr for GizmoType {
    type Err = crate::error::ChronicleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snorlax" => Ok(GizmoType::Snorlax),
            "gpt" => Ok(GizmoType::Gpt),
            other => Err(crate::error::ChronicleError::InvalidInput(format!(
                "unknown gizmo_type: {other}"
            ))),
        }
    }
}

impl GizmoType {
    /// The archive never carries an explicit type for a `gizmo_id`, only the
    /// id string itself. `g-p-*` is the export's own prefix for a
    /// project-scoped persona; everything else is a custom GPT.
    pub fn infer(gizmo_id: &str) -> Self {
        if gizmo_id.starts_with("g-p-") {
            GizmoType::Snorlax
        } else {
            GizmoType::Gpt
        }
    }
}

/// A project/persona grouping of conversations, keyed by gizmo_id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub gizmo_id: String,
    pub gizmo_type: GizmoType,
    pub display_name: String,
    pub conversation_count: i64,
}

/// The kind of target an AI-pattern job runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Conversation,
    Project,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Conversation => "conversation",
            JobType::Project => "project",
        }
    }
}

impl FromStr for JobType {
    type Err = crate::error::ChronicleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(JobType::Conversation),
            "project" => Ok(JobType::Project),
            other => Err(crate::error::ChronicleError::InvalidInput(format!(
                "unknown job type: {other}"
            ))),
        }
    }
}

/// Job lifecycle state. Terminal states are `Done` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = crate::error::ChronicleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::error::ChronicleError::Internal(format!(
                "unknown job status in store: {other}"
            ))),
        }
    }
}

/// Progress marker written by a Worker, stored as JSON in the `jobs.progress` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobProgress {
    pub current: i64,
    pub total: i64,
    pub message: String,
}

/// A persisted AI-pattern job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub target_id: String,
    pub target_name: String,
    pub pattern: String,
    pub status: JobStatus,
    pub progress: Option<JobProgress>,
    pub result_path: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub last_heartbeat_at: Option<i64>,
}

/// The fixed pattern enumerations from spec §6.
pub mod pattern {
    pub const CONVERSATION_PATTERNS: &[&str] = &[
        "extract_wisdom",
        "summarize",
        "analyze_debate",
        "rate_content",
        "create_report_finding",
    ];

    pub const PROJECT_PATTERNS: &[&str] = &["summarize", "extract_wisdom", "analyze_paper"];

    /// Validate a pattern name against the enumeration for a given job type.
    pub fn is_valid(job_type: super::JobType, pattern: &str) -> bool {
        match job_type {
            super::JobType::Conversation => CONVERSATION_PATTERNS.contains(&pattern),
            super::JobType::Project => PROJECT_PATTERNS.contains(&pattern),
        }
    }
}

/// Offset/limit/filter parameters for listing conversations.
#[derive(Debug, Clone, Default)]
pub struct ConversationListOptions {
    pub limit: i64,
    pub offset: i64,
    pub title_contains: Option<String>,
    pub gizmo_id: Option<String>,
}

/// Aggregate counters for the dashboard/stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Stats {
    pub conversations: i64,
    pub messages: i64,
    pub chunks: i64,
    pub projects: i64,
}

/// A ranked (or substring-fallback) search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub message_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub snippet: String,
    pub created_at: i64,
    pub rank: f64,
}

/// Totals reported by an ingest run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IngestReport {
    pub added: i64,
    pub skipped: i64,
    pub failed_records: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [
            Role::User,
            Role::Assistant,
            Role::System,
            Role::Tool,
            Role::Unknown,
        ] {
            let parsed: Role = role.as_str().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn unknown_role_strings_fold_to_unknown() {
        assert_eq!("bot".parse::<Role>().unwrap(), Role::Unknown);
        assert_eq!("".parse::<Role>().unwrap(), Role::Unknown);
    }

    #[test]
    fn gizmo_type_is_inferred_from_id_prefix() {
        assert_eq!(GizmoType::infer("g-p-abc123"), GizmoType::Snorlax);
        assert_eq!(GizmoType::infer("g-abc123"), GizmoType::Gpt);
    }

    #[test]
    fn pattern_validation_is_scoped_by_job_type() {
        assert!(pattern::is_valid(JobType::Conversation, "summarize"));
        assert!(pattern::is_valid(JobType::Project, "analyze_paper"));
        assert!(!pattern::is_valid(JobType::Project, "analyze_debate"));
        assert!(!pattern::is_valid(JobType::Conversation, "analyze_paper"));
    }
}
