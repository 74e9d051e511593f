//! Full-text search over the corpus (spec §4.5).

mod bm25;

use crate::error::Result;
use crate::store::Storage;
use crate::types::SearchHit;

/// Searches `messages.content_text` via the bm25-ranked FTS5 index, falling
/// back to substring matching when the query cannot be parsed as FTS5 syntax.
pub struct Searcher;

impl Searcher {
    pub fn search(storage: &Storage, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
        storage.with_connection(|conn| bm25::search(conn, query, limit))
    }
}
