//! chronicle: ingest, search and reshape a chat-history corpus from the
//! command line (spec §6). Exit codes: 0 success, 1 argument error, 2 parse
//! failure, 3 I/O failure, 4 subprocess failure.

use std::time::Duration;

use clap::Parser;

use chronicle::config::{init_tracing, CliArgs, CliCommand, ExportFormat, JobsCommand};
use chronicle::error::ChronicleError;
use chronicle::export;
use chronicle::ingest::Ingestor;
use chronicle::jobs::{Coordinator, SubmitRequest};
use chronicle::search::Searcher;
use chronicle::store::queries::get_stats;
use chronicle::store::Storage;
use chronicle::types::JobType;

fn main() {
    let args = CliArgs::parse();
    init_tracing(&args.log_format);

    let exit_code = match run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("chronicle: {e}");
            exit_code_for(&e)
        }
    };
    std::process::exit(exit_code);
}

fn exit_code_for(err: &ChronicleError) -> i32 {
    match err {
        ChronicleError::InvalidInput(_) | ChronicleError::NotFound(_) | ChronicleError::Conflict(_) => 1,
        ChronicleError::Archive(_) | ChronicleError::Json(_) | ChronicleError::Zip(_) => 2,
        ChronicleError::Io(_) | ChronicleError::Database(_) | ChronicleError::Store(_) => 3,
        ChronicleError::Worker(_) => 4,
        ChronicleError::Config(_) | ChronicleError::Internal(_) => 1,
    }
}

fn run(args: CliArgs) -> chronicle::Result<()> {
    let storage = Storage::open_read_write(args.store.db_path())?;

    match args.command {
        CliCommand::Ingest { archive_path, force } => {
            let report = Ingestor::ingest(&storage, &archive_path, force)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        CliCommand::Chunk {
            conversation_id,
            target_size,
            overlap,
        } => {
            let config = chronicle::chunk::ChunkConfig { target_size, overlap };
            let chunks = chronicle::chunk::Chunker::chunk(&storage, &conversation_id, config)?;
            println!("wrote {} chunks", chunks.len());
        }

        CliCommand::Search { query, limit } => {
            let hits = Searcher::search(&storage, &query, limit)?;
            for hit in hits {
                println!("[{}] {} ({:.3}): {}", hit.conversation_id, hit.role, hit.rank, hit.snippet);
            }
        }

        CliCommand::Export { format } => run_export(&storage, format)?,

        CliCommand::Jobs { action } => run_jobs(
            &storage,
            &args.store.cache_dir(),
            &args.worker_bin,
            &args.pattern_bin,
            action,
        )?,

        CliCommand::Stats => {
            let stats = storage.with_connection(get_stats)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn run_export(storage: &Storage, format: ExportFormat) -> chronicle::Result<()> {
    match format {
        ExportFormat::Markdown { conversation_id, redact } => {
            println!("{}", export::markdown(storage, &conversation_id, redact)?);
        }
        ExportFormat::Jsonl { redact } => {
            println!("{}", export::jsonl::export(storage, redact)?);
        }
        ExportFormat::Pairs { conversation_id, redact } => {
            let pairs = export::training_pairs(storage, &conversation_id, redact)?;
            for pair in pairs {
                println!("{}", serde_json::to_string(&pair)?);
            }
        }
        ExportFormat::Obsidian { out_dir, redact } => {
            let paths = export::vault::export(storage, &out_dir, redact)?;
            println!("wrote {} documents to {}", paths.len(), out_dir.display());
        }
    }
    Ok(())
}

fn run_jobs(
    storage: &Storage,
    cache_dir: &std::path::Path,
    worker_bin: &str,
    pattern_bin: &str,
    action: JobsCommand,
) -> chronicle::Result<()> {
    let coordinator = Coordinator::new(storage.clone(), cache_dir, worker_bin, pattern_bin);
    coordinator.reap_abandoned(Duration::from_secs(15 * 60))?;

    match action {
        JobsCommand::Submit {
            job_type,
            target_id,
            target_name,
            pattern,
        } => {
            let job_type: JobType = job_type.parse()?;
            let job = coordinator.submit(SubmitRequest {
                job_type,
                target_id,
                target_name,
                pattern,
            })?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        JobsCommand::Get { job_id } => {
            let job = coordinator.get(&job_id)?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        JobsCommand::Delete { job_id } => {
            coordinator.delete(&job_id)?;
            println!("deleted {job_id}");
        }
        JobsCommand::Stream { job_id } => {
            use futures::StreamExt;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let mut stream = coordinator.stream(job_id);
                while let Some(event) = stream.next().await {
                    println!("{}", serde_json::to_string(&event)?);
                }
                Ok::<(), chronicle::ChronicleError>(())
            })?;
        }
    }
    Ok(())
}
