//! The Worker: out-of-process executor invoked by the Coordinator with a
//! job id. Renders a prompt, shells out to the external AI-pattern tool,
//! and writes the result artifact (spec §4.8).
//!
//! The markdown-to-PDF rendering chain is an out-of-scope collaborator, so
//! the artifact written here is the pattern tool's raw text output at
//! `<cache_dir>/<job_id>.txt` rather than a PDF.

use std::path::Path;

use tracing::{info, warn};

use crate::error::{ChronicleError, Result};
use crate::export::document;
use crate::store::queries::{
    conversations_for_gizmo, get_job, get_messages, transition_job_done, transition_job_failed,
    transition_job_running, update_job_progress,
};
use crate::store::Storage;
use crate::types::{JobProgress, JobType};

/// Run one job to completion: transition to `running`, render the prompt,
/// invoke the pattern tool, and transition to `done` or `failed`.
pub fn run_job(storage: &Storage, cache_dir: &Path, pattern_bin: &str, job_id: &str) -> Result<()> {
    let job = storage.with_connection(|conn| get_job(conn, job_id))?;
    let started_at = chrono::Utc::now().timestamp();
    storage.with_transaction(|tx| transition_job_running(tx, job_id, started_at))?;
    info!(job_id, pattern = %job.pattern, "worker starting job");

    let prompt = match job.job_type {
        JobType::Conversation => document_for_conversation(storage, &job.target_id)?,
        JobType::Project => document_for_project(storage, &job.target_id)?,
    };

    match invoke_pattern(pattern_bin, &job.pattern, &prompt) {
        Ok(output) => {
            std::fs::create_dir_all(cache_dir)?;
            let path = cache_dir.join(format!("{job_id}.txt"));
            std::fs::write(&path, output)?;
            let finished_at = chrono::Utc::now().timestamp();
            storage.with_transaction(|tx| {
                transition_job_done(tx, job_id, &path.to_string_lossy(), finished_at)
            })?;
            info!(job_id, "worker finished job");
        }
        Err(e) => {
            let finished_at = chrono::Utc::now().timestamp();
            let message = first_line(&e.to_string());
            storage.with_transaction(|tx| transition_job_failed(tx, job_id, &message, finished_at))?;
            warn!(job_id, error = %message, "worker job failed");
        }
    }

    Ok(())
}

/// Write a progress marker, bumping the heartbeat so the job is not reaped
/// as abandoned while genuinely making progress.
pub fn report_progress(storage: &Storage, job_id: &str, current: i64, total: i64, message: &str) -> Result<()> {
    let progress = JobProgress {
        current,
        total,
        message: message.to_string(),
    };
    let now = chrono::Utc::now().timestamp();
    storage.with_transaction(|tx| update_job_progress(tx, job_id, &progress, now))
}

fn document_for_conversation(storage: &Storage, conversation_id: &str) -> Result<String> {
    crate::export::markdown(storage, conversation_id, false)
}

fn document_for_project(storage: &Storage, gizmo_id: &str) -> Result<String> {
    let conversations = storage.with_connection(|conn| conversations_for_gizmo(conn, gizmo_id))?;
    let mut doc = String::new();
    for conversation in &conversations {
        let messages = storage.with_connection(|conn| get_messages(conn, &conversation.id))?;
        doc.push_str(&document::render(conversation, &messages, false));
        doc.push_str("\n\n---\n\n");
    }
    Ok(doc)
}

/// Shell out to the configured pattern executable, feeding the rendered
/// document on stdin and the pattern name as its sole argument.
fn invoke_pattern(pattern_bin: &str, pattern: &str, prompt: &str) -> Result<String> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = Command::new(pattern_bin)
        .arg(pattern)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ChronicleError::Worker(format!("failed to spawn pattern tool: {e}")))?;

    child
        .stdin
        .take()
        .ok_or_else(|| ChronicleError::Worker("pattern tool stdin unavailable".to_string()))?
        .write_all(prompt.as_bytes())
        .map_err(|e| ChronicleError::Worker(format!("failed to write prompt: {e}")))?;

    let output = child
        .wait_with_output()
        .map_err(|e| ChronicleError::Worker(format!("pattern tool did not exit cleanly: {e}")))?;

    if !output.status.success() {
        return Err(ChronicleError::Worker(format!(
            "pattern tool exited with {}",
            output.status
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| ChronicleError::Worker(format!("pattern tool produced non-utf8 output: {e}")))
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or(s).to_string()
}
