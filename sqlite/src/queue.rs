//! Serialized access to the single database connection.
//!
//! [`DatabaseQueue`] owns the one [`Connection`] and is the only way to reach
//! it. Every operation is a closure submitted with
//! [`submit`](DatabaseQueue::submit); the calling thread blocks until the
//! closure has run, and no two closures ever run against the connection at
//! the same time. Submissions from one thread run in program order.
//!
//! The gate is a reentrant mutex: a closure that submits again on the same
//! queue runs the nested closure directly on the connection it already
//! holds instead of deadlocking. Code that wants to stay inside an enclosing
//! transaction can also pass the held connection down as
//! [`Db::Connection`].
//!
//! # Example
//!
//! ```
//! use activerow_sqlite::DatabaseQueue;
//!
//! let queue = DatabaseQueue::open_in_memory().unwrap();
//! queue
//!     .submit(|conn| Ok(conn.execute_batch("CREATE TABLE t (x INTEGER)")?))
//!     .unwrap();
//! let n: i64 = queue
//!     .submit(|conn| {
//!         // Nested submission on the same thread runs inline.
//!         queue.submit(|inner| Ok(inner.execute("INSERT INTO t VALUES (1)", [])?))?;
//!         Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
//!     })
//!     .unwrap();
//! assert_eq!(n, 1);
//! ```

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use parking_lot::ReentrantMutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

struct Slot {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

/// The mutual-exclusion gate around the one logical connection.
pub struct DatabaseQueue {
    slot: ReentrantMutex<RefCell<Slot>>,
}

impl Default for DatabaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseQueue {
    /// Creates a queue with no connection. Every submission fails with
    /// [`StoreError::ConnectionUnavailable`] until [`open`](Self::open)
    /// succeeds.
    pub fn new() -> Self {
        Self {
            slot: ReentrantMutex::new(RefCell::new(Slot {
                conn: None,
                path: None,
            })),
        }
    }

    /// Creates a queue over a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let queue = Self::new();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        queue.install(conn, None)?;
        Ok(queue)
    }

    /// Creates a queue and opens the database file at `path`.
    pub fn open_path(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let queue = Self::new();
        queue.open(path, config)?;
        Ok(queue)
    }

    /// Opens (or re-opens) the database file at `path`, replacing any
    /// current connection.
    ///
    /// On failure the queue is left without a connection, so subsequent
    /// submissions fail with [`StoreError::ConnectionUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseOpen`] if the file cannot be opened or
    /// configured, or [`StoreError::ConnectionInUse`] when called from
    /// inside a running operation.
    pub fn open(&self, path: impl AsRef<Path>, config: &StoreConfig) -> Result<()> {
        let path = path.as_ref();
        let opened = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .and_then(|conn| {
            conn.execute_batch(&config.pragma_sql())?;
            Ok(conn)
        });

        match opened {
            Ok(conn) => {
                self.install(conn, Some(path.to_path_buf()))?;
                info!(path = %path.display(), "opened database");
                Ok(())
            }
            Err(source) => {
                warn!(path = %path.display(), error = %source, "failed to open database");
                self.take()?;
                Err(StoreError::DatabaseOpen {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Closes the connection. Further submissions fail with
    /// [`StoreError::ConnectionUnavailable`] until re-opened.
    pub fn close(&self) -> Result<()> {
        if let Some(conn) = self.take()? {
            conn.close().map_err(|(_, e)| StoreError::DatabaseError(e))?;
            debug!("closed database");
        }
        Ok(())
    }

    /// Returns `true` if a connection is open.
    pub fn is_open(&self) -> bool {
        let guard = self.slot.lock();
        let open = guard.try_borrow().map(|slot| slot.conn.is_some()).unwrap_or(true);
        open
    }

    /// Path of the open database file; `None` when closed or in memory.
    pub fn path(&self) -> Option<PathBuf> {
        let guard = self.slot.lock();
        let path = guard.try_borrow().ok().and_then(|slot| slot.path.clone());
        path
    }

    /// Runs `op` against the connection, blocking until it has finished.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionUnavailable`] if no connection is
    /// open, otherwise whatever `op` returns.
    pub fn submit<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self.slot.lock();
        let slot = guard
            .try_borrow()
            .map_err(|_| StoreError::ConnectionUnavailable)?;
        let conn = slot.conn.as_ref().ok_or(StoreError::ConnectionUnavailable)?;
        op(conn)
    }

    /// Runs `op` inside a transaction, committing on success and rolling
    /// back on error. Nested inside another transaction, a savepoint is used.
    pub fn submit_transaction<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        self.submit(|conn| with_transaction(conn, op))
    }

    fn install(&self, conn: Connection, path: Option<PathBuf>) -> Result<()> {
        let old = {
            let guard = self.slot.lock();
            let mut slot = guard
                .try_borrow_mut()
                .map_err(|_| StoreError::ConnectionInUse)?;
            slot.path = path;
            slot.conn.replace(conn)
        };
        if let Some(old) = old {
            if let Err((_, e)) = old.close() {
                warn!(error = %e, "failed to close replaced connection");
            }
        }
        Ok(())
    }

    fn take(&self) -> Result<Option<Connection>> {
        let guard = self.slot.lock();
        let mut slot = guard
            .try_borrow_mut()
            .map_err(|_| StoreError::ConnectionInUse)?;
        slot.path = None;
        Ok(slot.conn.take())
    }
}

/// Runs `op` in a transaction on `conn`, or in a savepoint if `conn` is
/// already inside one.
pub fn with_transaction<T, F>(conn: &Connection, op: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    if conn.is_autocommit() {
        let tx = conn.unchecked_transaction()?;
        let out = op(&tx)?;
        tx.commit()?;
        Ok(out)
    } else {
        conn.execute_batch("SAVEPOINT activerow_nested")?;
        match op(conn) {
            Ok(out) => {
                conn.execute_batch("RELEASE activerow_nested")?;
                Ok(out)
            }
            Err(e) => {
                if let Err(rollback) =
                    conn.execute_batch("ROLLBACK TO activerow_nested; RELEASE activerow_nested")
                {
                    warn!(error = %rollback, "failed to roll back savepoint");
                }
                Err(e)
            }
        }
    }
}

/// Where an operation runs: through a queue, or directly on a connection
/// the caller already holds (for example inside a transaction).
#[derive(Clone, Copy)]
pub enum Db<'a> {
    Queue(&'a DatabaseQueue),
    Connection(&'a Connection),
}

impl<'a> Db<'a> {
    /// Runs `op` in this context.
    pub fn run<T, F>(self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        match self {
            Db::Queue(queue) => queue.submit(op),
            Db::Connection(conn) => op(conn),
        }
    }

    /// Runs `op` in a transaction (or savepoint) in this context.
    pub fn transaction<T, F>(self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        self.run(|conn| with_transaction(conn, op))
    }
}

impl<'a> From<&'a DatabaseQueue> for Db<'a> {
    fn from(queue: &'a DatabaseQueue) -> Self {
        Db::Queue(queue)
    }
}

impl<'a> From<&'a Connection> for Db<'a> {
    fn from(conn: &'a Connection) -> Self {
        Db::Connection(conn)
    }
}

impl<'a> From<&'a rusqlite::Transaction<'_>> for Db<'a> {
    fn from(tx: &'a rusqlite::Transaction<'_>) -> Self {
        Db::Connection(tx)
    }
}
