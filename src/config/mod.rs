//! Configuration: one `clap::Parser` args struct per binary, every flag with
//! an environment-variable fallback and a sensible default (spec §A.3).

use std::path::PathBuf;

use clap::Parser;

fn default_db_path() -> String {
    default_data_dir().join("corpus.db").to_string_lossy().into_owned()
}

fn default_cache_dir() -> String {
    default_data_dir().join("generated").to_string_lossy().into_owned()
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chronicle")
}

/// Expand a `~`-prefixed path the way the rest of the stack expects paths to
/// be written in config files and CLI flags.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Shared store/cache location flags, embedded into every binary's args.
#[derive(Debug, Parser, Clone)]
pub struct StoreArgs {
    /// Path to the corpus database file.
    #[arg(long, env = "CHRONICLE_DB_PATH", default_value_t = default_db_path())]
    pub db_path: String,

    /// Directory for cached job result artifacts.
    #[arg(long, env = "CHRONICLE_CACHE_DIR", default_value_t = default_cache_dir())]
    pub cache_dir: String,
}

impl StoreArgs {
    pub fn db_path(&self) -> PathBuf {
        expand_path(&self.db_path)
    }

    pub fn cache_dir(&self) -> PathBuf {
        expand_path(&self.cache_dir)
    }
}

/// `chronicle` CLI top-level args.
#[derive(Debug, Parser)]
#[command(name = "chronicle", about = "Ingest, search and export a chat-history corpus")]
pub struct CliArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Log output format: `text` or `json`.
    #[arg(long, env = "CHRONICLE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Path to the `chronicle-worker` executable spawned for each job.
    #[arg(long, env = "CHRONICLE_WORKER_BIN", default_value = "chronicle-worker")]
    pub worker_bin: String,

    /// Path to the external AI-pattern executable invoked by the Worker.
    #[arg(long, env = "CHRONICLE_PATTERN_BIN", default_value = "fabric")]
    pub pattern_bin: String,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum CliCommand {
    /// Ingest a chat-history export archive.
    Ingest {
        archive_path: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// (Re)chunk a conversation.
    Chunk {
        conversation_id: String,
        #[arg(long, env = "CHRONICLE_CHUNK_TARGET_SIZE", default_value_t = 2500)]
        target_size: i64,
        #[arg(long, env = "CHRONICLE_CHUNK_OVERLAP", default_value_t = 375)]
        overlap: i64,
    },
    /// Full-text search the corpus.
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Render exports.
    Export {
        #[command(subcommand)]
        format: ExportFormat,
    },
    /// Manage AI-pattern jobs.
    Jobs {
        #[command(subcommand)]
        action: JobsCommand,
    },
    /// Print corpus counts.
    Stats,
}

#[derive(Debug, clap::Subcommand)]
pub enum ExportFormat {
    Markdown {
        conversation_id: String,
        #[arg(long)]
        redact: bool,
    },
    Jsonl {
        #[arg(long)]
        redact: bool,
    },
    Pairs {
        conversation_id: String,
        #[arg(long)]
        redact: bool,
    },
    Obsidian {
        out_dir: PathBuf,
        #[arg(long)]
        redact: bool,
    },
}

#[derive(Debug, clap::Subcommand)]
pub enum JobsCommand {
    Submit {
        job_type: String,
        target_id: String,
        target_name: String,
        pattern: String,
    },
    Get {
        job_id: String,
    },
    Delete {
        job_id: String,
    },
    Stream {
        job_id: String,
    },
}

/// `chronicled` server args.
#[derive(Debug, Parser)]
#[command(name = "chronicled", about = "HTTP server for the chronicle corpus")]
pub struct ServerArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, env = "CHRONICLE_HTTP_ADDR", default_value = "127.0.0.1:8733")]
    pub http_addr: String,

    #[arg(long, env = "CHRONICLE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Path to the external AI-pattern executable invoked by the Worker.
    #[arg(long, env = "CHRONICLE_PATTERN_BIN", default_value = "fabric")]
    pub pattern_bin: String,

    /// Path to the `chronicle-worker` executable spawned for each job.
    #[arg(long, env = "CHRONICLE_WORKER_BIN", default_value = "chronicle-worker")]
    pub worker_bin: String,
}

/// `chronicle-worker` args: a single job id plus the shared store/cache paths.
#[derive(Debug, Parser)]
#[command(name = "chronicle-worker", about = "Executes one AI-pattern job")]
pub struct WorkerArgs {
    pub job_id: String,

    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, env = "CHRONICLE_PATTERN_BIN", default_value = "fabric")]
    pub pattern_bin: String,
}

/// Install the `tracing` subscriber per [`ServerArgs::log_format`] /
/// [`CliArgs::log_format`]: `EnvFilter` driven by `RUST_LOG`, plain `fmt` by
/// default, structured JSON when `log_format == "json"`.
pub fn init_tracing(log_format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_format == "json" {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_path_resolves_tilde() {
        let home = dirs::home_dir().unwrap();
        let expanded = expand_path("~/chronicle/corpus.db");
        assert!(expanded.starts_with(home));
    }
}
