//! SQLite database handle.
//!
//! [`Database`] wraps a single `rusqlite` connection behind an async mutex.
//! All work runs in `tokio::task::spawn_blocking` so the runtime never blocks
//! on disk I/O. Three entry points are offered:
//!
//! - [`Database::run`] executes a closure against the connection.
//! - [`Database::atomic`] executes a closure inside a transaction that commits
//!   only when the closure returns `Ok`.
//! - [`Database::locked`] is `atomic` with an `EXCLUSIVE` transaction, used for
//!   read-modify-write sequences that must not interleave with other writers
//!   (for example re-ranking siblings or assigning the next rank).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::Mutex;

use crate::error::{CmsError, CmsResult};
use crate::settings::DatabaseSettings;

/// A shared SQLite database.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct Database {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens a SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created. WAL
    /// journal mode and foreign keys are enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>, busy_timeout: Duration) -> CmsResult<Self> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            Connection::open_in_memory()
        } else {
            Connection::open(&path)
        }
        .map_err(|e| CmsError::OperationalError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| CmsError::OperationalError(format!("Failed to set pragmas: {e}")))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| CmsError::OperationalError(format!("Failed to set busy timeout: {e}")))?;

        tracing::debug!(path = %path.display(), "opened database");
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens the database described by the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn from_settings(settings: &DatabaseSettings) -> CmsResult<Self> {
        Self::open(
            settings.name.as_str(),
            Duration::from_millis(settings.busy_timeout_ms),
        )
    }

    /// Opens an in-memory database (convenience constructor for tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> CmsResult<Self> {
        Self::open(":memory:", Duration::from_secs(5))
    }

    /// Returns the database file path.
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Runs `f` against the connection outside of any explicit transaction.
    pub async fn run<F, T>(&self, f: F) -> CmsResult<T>
    where
        F: FnOnce(&Connection) -> CmsResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| CmsError::OperationalError(format!("Task join error: {e}")))?
    }

    /// Runs `f` inside a deferred transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise.
    pub async fn atomic<F, T>(&self, f: F) -> CmsResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> CmsResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.transaction(TransactionBehavior::Deferred, None, f)
            .await
    }

    /// Runs `f` while holding an exclusive lock on the database.
    ///
    /// `table` names the table whose rows the closure reads and rewrites; it
    /// is recorded in the logs. SQLite's `EXCLUSIVE` transaction blocks every
    /// other writer and reader on other connections until commit, so the
    /// lock is at least as strong as a table lock.
    pub async fn locked<F, T>(&self, table: &'static str, f: F) -> CmsResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> CmsResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.transaction(TransactionBehavior::Exclusive, Some(table), f)
            .await
    }

    async fn transaction<F, T>(
        &self,
        behavior: TransactionBehavior,
        table: Option<&'static str>,
        f: F,
    ) -> CmsResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> CmsResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let txn = conn.transaction_with_behavior(behavior)?;
            if let Some(table) = table {
                tracing::trace!(table, "acquired exclusive lock");
            }
            // Dropping `txn` on the error path rolls it back.
            let value = f(&txn)?;
            txn.commit()?;
            Ok(value)
        })
        .await
        .map_err(|e| CmsError::OperationalError(format!("Task join error: {e}")))?
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db_with_table() -> Database {
        let db = Database::memory().unwrap();
        db.run(|conn| {
            conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, val INTEGER NOT NULL)")?;
            Ok(())
        })
        .await
        .unwrap();
        db
    }

    async fn count(db: &Database) -> i64 {
        db.run(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_memory_open() {
        let db = Database::memory().unwrap();
        assert_eq!(db.path(), &PathBuf::from(":memory:"));
    }

    #[tokio::test]
    async fn test_run_insert_and_query() {
        let db = db_with_table().await;
        db.run(|conn| {
            conn.execute("INSERT INTO t (val) VALUES (?1)", [7])?;
            Ok(())
        })
        .await
        .unwrap();
        let val: i64 = db
            .run(|conn| Ok(conn.query_row("SELECT val FROM t", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(val, 7);
    }

    #[tokio::test]
    async fn test_atomic_commits_on_ok() {
        let db = db_with_table().await;
        db.atomic(|txn| {
            txn.execute("INSERT INTO t (val) VALUES (1)", [])?;
            txn.execute("INSERT INTO t (val) VALUES (2)", [])?;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(count(&db).await, 2);
    }

    #[tokio::test]
    async fn test_atomic_rolls_back_on_err() {
        let db = db_with_table().await;
        let result: CmsResult<()> = db
            .atomic(|txn| {
                txn.execute("INSERT INTO t (val) VALUES (1)", [])?;
                Err(CmsError::BadRequest("abort".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_locked_rolls_back_on_err() {
        let db = db_with_table().await;
        let result: CmsResult<()> = db
            .locked("t", |txn| {
                txn.execute("INSERT INTO t (val) VALUES (1)", [])?;
                Err(CmsError::DatabaseError("boom".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_locked_serializes_read_modify_write() {
        let db = db_with_table().await;
        db.run(|conn| {
            conn.execute("INSERT INTO t (id, val) VALUES (1, 0)", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.locked("t", |txn| {
                    let val: i64 = txn.query_row("SELECT val FROM t WHERE id = 1", [], |r| r.get(0))?;
                    txn.execute("UPDATE t SET val = ?1 WHERE id = 1", [val + 1])?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let val: i64 = db
            .run(|conn| Ok(conn.query_row("SELECT val FROM t WHERE id = 1", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(val, 20);
    }

    #[tokio::test]
    async fn test_file_database_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cms.sqlite3");
        let first = Database::open(&path, Duration::from_secs(5)).unwrap();
        first
            .run(|conn| {
                conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, val INTEGER)")?;
                conn.execute("INSERT INTO t (val) VALUES (3)", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let second = Database::open(&path, Duration::from_secs(5)).unwrap();
        assert_eq!(count(&second).await, 1);
    }
}
