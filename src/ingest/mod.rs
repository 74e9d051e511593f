//! The Ingestor: drives the Parser, deduplicates by content hash, persists
//! conversations and messages, and populates FTS (spec §4.2).

pub mod hash;
pub mod redact;

use tracing::{info, warn};

use crate::archive::parse_archive;
use crate::error::Result;
use crate::store::queries::{
    conversation_by_raw_hash, delete_conversation, ingest_log_is_complete, insert_message,
    mark_ingest_complete, upsert_conversation, upsert_project,
};
use crate::store::Storage;
use crate::types::{GizmoType, IngestReport, Project};

pub struct Ingestor;

impl Ingestor {
    /// Ingest every conversation in the archive at `archive_path`.
    ///
    /// A conversation already stored under the same `raw_hash`, with a
    /// completed ingest-log entry, is skipped unless `force` is set. A
    /// previous attempt that never completed (no `complete=1` sentinel row)
    /// is retried regardless of `force`, since its rows may be partial.
    pub fn ingest(storage: &Storage, archive_path: &std::path::Path, force: bool) -> Result<IngestReport> {
        let parsed = parse_archive(archive_path)?;
        let mut report = IngestReport::default();

        for conversation in parsed.conversations {
            let id = conversation.conversation.id.clone();
            let raw_hash = conversation.conversation.raw_hash.clone();

            let already_complete = storage.with_connection(|conn| {
                let exists = conversation_by_raw_hash(conn, &id, &raw_hash)?.is_some();
                let complete = ingest_log_is_complete(conn, &id, &raw_hash)?;
                Ok(exists && complete)
            })?;

            if already_complete && !force {
                info!(conversation_id = %id, "skipping already-ingested conversation");
                report.skipped += 1;
                continue;
            }

            let now = chrono::Utc::now().timestamp();
            let result = storage.with_transaction(|tx| {
                // Unconditional: a no-op DELETE when nothing exists yet, and
                // the correct behavior for both forced re-import and a
                // resumed-but-never-completed prior attempt.
                delete_conversation(tx, &id)?;
                upsert_conversation(tx, &conversation.conversation)?;
                for message in &conversation.messages {
                    insert_message(tx, message)?;
                }
                if let Some(gizmo_id) = &conversation.conversation.gizmo_id {
                    // The archive never names a project's display name or
                    // type explicitly, only the gizmo_id; fall back to the
                    // id itself until a caller renames it via the store.
                    upsert_project(
                        tx,
                        &Project {
                            gizmo_id: gizmo_id.clone(),
                            gizmo_type: GizmoType::infer(gizmo_id),
                            display_name: gizmo_id.clone(),
                            conversation_count: 0,
                        },
                    )?;
                }
                mark_ingest_complete(tx, &id, &raw_hash, now)?;
                Ok(())
            });

            match result {
                Ok(()) => {
                    info!(conversation_id = %id, messages = conversation.messages.len(), "ingested conversation");
                    report.added += 1;
                }
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "conversation ingest transaction failed, skipping");
                    report.failed_records += 1;
                }
            }
        }

        report.failed_records += parsed.failed_records;
        Ok(report)
    }
}
