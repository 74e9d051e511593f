//! chronicle - offline ingestion, search and reshaping for chat-history exports
//!
//! Parses an export archive into a linear, turn-indexed corpus; persists it
//! in a single SQLite file with a full-text index; chunks, searches and
//! exports that corpus; and coordinates long-running AI-pattern jobs against
//! it via an out-of-process Worker.

pub mod archive;
pub mod chunk;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod jobs;
pub mod search;
pub mod store;
pub mod types;
pub mod worker;

pub use error::{ChronicleError, Result};
pub use store::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
