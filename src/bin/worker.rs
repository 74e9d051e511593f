//! chronicle-worker: executes one AI-pattern job and exits.
//!
//! Invoked by the Coordinator as `chronicle-worker <job_id> --db-path ...
//! --cache-dir ... --pattern-bin ...`. Never invoked directly by a user.

use clap::Parser;

use chronicle::config::{init_tracing, WorkerArgs};
use chronicle::store::Storage;
use chronicle::worker::run_job;

fn main() {
    let args = WorkerArgs::parse();
    init_tracing("text");

    let storage = match Storage::open_read_write(args.store.db_path()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("chronicle-worker: failed to open store: {e}");
            std::process::exit(3);
        }
    };

    match run_job(&storage, &args.store.cache_dir(), &args.pattern_bin, &args.job_id) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("chronicle-worker: {e}");
            std::process::exit(4);
        }
    }
}
