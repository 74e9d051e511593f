//! The Job Coordinator: submits, deduplicates, tracks, streams and cancels
//! AI-pattern jobs, and manages the on-disk result cache (spec §4.7).

pub mod pattern;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ChronicleError, Result};
use crate::store::queries::{
    active_job, delete_job, get_job, get_job_opt, insert_job, latest_done_job, stale_jobs,
    transition_job_failed,
};
use crate::store::Storage;
use crate::types::{Job, JobProgress, JobStatus, JobType};

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub job_type: JobType,
    pub target_id: String,
    pub target_name: String,
    pub pattern: String,
}

/// An event emitted by [`Coordinator::stream`] (spec §4.7).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress {
        status: JobStatus,
        progress: Option<JobProgress>,
    },
    Done {
        status: JobStatus,
        result_path: Option<String>,
    },
    Failed {
        status: JobStatus,
        error: Option<String>,
    },
}

pub struct Coordinator {
    storage: Storage,
    cache_dir: PathBuf,
    worker_bin: PathBuf,
    pattern_bin: String,
}

impl Coordinator {
    pub fn new(
        storage: Storage,
        cache_dir: impl Into<PathBuf>,
        worker_bin: impl Into<PathBuf>,
        pattern_bin: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            cache_dir: cache_dir.into(),
            worker_bin: worker_bin.into(),
            pattern_bin: pattern_bin.into(),
        }
    }

    /// Submit a job. Returns a cache hit or an already in-flight job in
    /// preference to starting new work (spec §4.7 steps a-d).
    pub fn submit(&self, req: SubmitRequest) -> Result<Job> {
        if !pattern::is_valid(req.job_type, &req.pattern) {
            return Err(ChronicleError::InvalidInput(format!(
                "pattern '{}' is not valid for job type '{}'",
                req.pattern,
                req.job_type.as_str()
            )));
        }

        if let Some(done) = self
            .storage
            .with_connection(|conn| latest_done_job(conn, &req.target_id, &req.pattern))?
        {
            if let Some(path) = &done.result_path {
                if Path::new(path).exists() {
                    info!(job_id = %done.id, "cache hit");
                    return Ok(done);
                }
                warn!(job_id = %done.id, path, "cached artifact missing, treating as cache miss");
            }
        }

        if let Some(active) = self
            .storage
            .with_connection(|conn| active_job(conn, &req.target_id, &req.pattern))?
        {
            info!(job_id = %active.id, "deduplicated onto in-flight job");
            return Ok(active);
        }

        let now = chrono::Utc::now().timestamp();
        let job = Job {
            id: Uuid::new_v4().to_string(),
            job_type: req.job_type,
            target_id: req.target_id,
            target_name: req.target_name,
            pattern: req.pattern,
            status: JobStatus::Pending,
            progress: None,
            result_path: None,
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            last_heartbeat_at: None,
        };
        self.storage.with_transaction(|tx| insert_job(tx, &job))?;
        self.spawn_worker(&job.id)?;
        info!(job_id = %job.id, pattern = %job.pattern, "submitted job");
        Ok(job)
    }

    fn spawn_worker(&self, job_id: &str) -> Result<()> {
        std::process::Command::new(&self.worker_bin)
            .arg(job_id)
            .arg("--db-path")
            .arg(self.storage.db_path())
            .arg("--cache-dir")
            .arg(&self.cache_dir)
            .arg("--pattern-bin")
            .arg(&self.pattern_bin)
            .spawn()?;
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Result<Job> {
        self.storage.with_connection(|conn| get_job(conn, job_id))
    }

    /// Delete a job row and, if present, its cached artifact. Allowed from
    /// any state; does not signal a still-running Worker.
    pub fn delete(&self, job_id: &str) -> Result<()> {
        let job = self.storage.with_connection(|conn| get_job(conn, job_id))?;
        self.storage.with_transaction(|tx| delete_job(tx, job_id))?;
        if let Some(path) = job.result_path {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }

    /// Probe `(target_id, pattern)` for a cache hit or an in-flight job
    /// without submitting new work.
    pub fn check(&self, target_id: &str, pattern: &str) -> Result<Option<Job>> {
        if let Some(done) = self
            .storage
            .with_connection(|conn| latest_done_job(conn, target_id, pattern))?
        {
            if done.result_path.as_deref().map(|p| Path::new(p).exists()).unwrap_or(false) {
                return Ok(Some(done));
            }
        }
        self.storage.with_connection(|conn| active_job(conn, target_id, pattern))
    }

    /// Transition any `pending`/`running` job whose heartbeat is missing or
    /// older than `max_age` to `failed` with `error = "abandoned"`.
    pub fn reap_abandoned(&self, max_age: Duration) -> Result<usize> {
        let cutoff = chrono::Utc::now().timestamp() - max_age.as_secs() as i64;
        let stale = self.storage.with_connection(|conn| stale_jobs(conn, cutoff))?;
        let now = chrono::Utc::now().timestamp();
        for job in &stale {
            warn!(job_id = %job.id, "reaping abandoned job");
            self.storage
                .with_transaction(|tx| transition_job_failed(tx, &job.id, "abandoned", now))?;
        }
        Ok(stale.len())
    }

    /// Poll the store at roughly 1 Hz, emitting one event per observed
    /// transition and closing immediately after the terminal event.
    pub fn stream(&self, job_id: String) -> impl Stream<Item = JobEvent> {
        let storage = self.storage.clone();
        futures::stream::unfold(
            StreamState {
                storage,
                job_id,
                last_status: None,
                last_progress: None,
                done: false,
            },
            |mut state| async move {
                if state.done {
                    return None;
                }
                loop {
                    let job = match state.storage.with_connection(|conn| get_job_opt(conn, &state.job_id)) {
                        Ok(Some(job)) => job,
                        _ => return None,
                    };

                    if job.status.is_terminal() {
                        state.done = true;
                        let event = match job.status {
                            JobStatus::Done => JobEvent::Done {
                                status: job.status,
                                result_path: job.result_path.clone(),
                            },
                            _ => JobEvent::Failed {
                                status: job.status,
                                error: job.error.clone(),
                            },
                        };
                        return Some((event, state));
                    }

                    if Some(job.status) != state.last_status || job.progress != state.last_progress {
                        state.last_status = Some(job.status);
                        state.last_progress = job.progress.clone();
                        let event = JobEvent::Progress {
                            status: job.status,
                            progress: job.progress,
                        };
                        return Some((event, state));
                    }

                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
            },
        )
    }
}

struct StreamState {
    storage: Storage,
    job_id: String,
    last_status: Option<JobStatus>,
    last_progress: Option<JobProgress>,
    done: bool,
}
