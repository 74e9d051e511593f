//! Database connection management with write-ahead journaling.
//!
//! One read-write handle drives ingestion and job bookkeeping; any number of
//! read-only handles serve queries. Both point at the same file; WAL mode
//! lets readers proceed without blocking the writer (spec §4.3, §5).

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::migrations::run_migrations;
use crate::error::Result;

/// Whether a `Storage` handle may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ReadWrite,
    ReadOnly,
}

/// A SQLite-backed handle onto the corpus database.
///
/// Read-write handles serialize writers through an internal mutex (SQLite
/// itself only ever allows one writer; the mutex just avoids busy-wait
/// retries inside a single process). Read-only handles hold no lock across
/// query boundaries.
pub struct Storage {
    mode: Mode,
    db_path: String,
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Open a read-write handle, creating and migrating the database if needed.
    pub fn open_read_write(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            mode: Mode::ReadWrite,
            db_path: db_path.to_string_lossy().into_owned(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a read-only handle onto an existing database.
    pub fn open_read_only(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)?;
        conn.execute_batch("PRAGMA busy_timeout=30000;")?;
        Ok(Self {
            mode: Mode::ReadOnly,
            db_path: db_path.to_string_lossy().into_owned(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory read-write handle, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            mode: Mode::ReadWrite,
            db_path: ":memory:".to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=30000;
            PRAGMA foreign_keys=ON;
            "#,
        )?;
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Run a read. No transaction is opened, so readers never block writers
    /// longer than it takes to acquire the in-process mutex.
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Run a short write transaction.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T>,
    {
        if self.mode == Mode::ReadOnly {
            return Err(crate::error::ChronicleError::Store(
                "attempted write on a read-only handle".to_string(),
            ));
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

impl Clone for Storage {
    fn clone(&self) -> Self {
        Self {
            mode: self.mode,
            db_path: self.db_path.clone(),
            conn: self.conn.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.db_path(), ":memory:");
        let count: i64 = storage
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.db");
        let _rw = Storage::open_read_write(&path).unwrap();
        let ro = Storage::open_read_only(&path).unwrap();
        let result = ro.with_transaction(|tx| {
            tx.execute("DELETE FROM conversations", [])?;
            Ok(())
        });
        assert!(result.is_err());
    }
}
