//! Storage engine for chronicle.
//!
//! Single-file SQLite database with a full-text virtual table, a read-only
//! handle for queries, and a read-write handle for ingestion and jobs
//! (spec §4.3).

mod connection;
mod migrations;
pub mod queries;

pub use connection::{Mode, Storage};
pub use migrations::SCHEMA_VERSION;
