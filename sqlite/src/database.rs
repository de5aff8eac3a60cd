//! The process-wide database.
//!
//! Applications normally work against one database file chosen at startup,
//! typically named after the signed-in user. [`set_database_name`] opens it
//! into the shared [`DatabaseQueue`] that every plain (context-free) record
//! and finder operation uses; calling it again switches files.

use std::sync::LazyLock;

use tracing::info;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::queue::DatabaseQueue;

static SHARED_QUEUE: LazyLock<DatabaseQueue> = LazyLock::new(DatabaseQueue::new);

/// The process-wide queue. Unopened until [`set_database_name`] succeeds.
pub fn shared_queue() -> &'static DatabaseQueue {
    &SHARED_QUEUE
}

/// Opens `<data_dir>/<name>.sqlite` with the default [`StoreConfig`] as the
/// shared database, replacing any open one.
pub fn set_database_name(name: &str) -> Result<()> {
    set_database_name_with(name, &StoreConfig::default())
}

/// Opens `<data_dir>/<name>.sqlite` using `config` as the shared database.
///
/// The data directory is created if missing.
///
/// # Errors
///
/// Returns [`StoreError::InvalidDatabaseName`] for an empty name, `.` or
/// `..`, or a name containing a path separator, before anything is opened.
pub fn set_database_name_with(name: &str, config: &StoreConfig) -> Result<()> {
    if !is_valid_database_name(name) {
        return Err(StoreError::InvalidDatabaseName(name.to_string()));
    }
    std::fs::create_dir_all(&config.data_dir)?;
    let path = config.database_path(name);
    SHARED_QUEUE.open(&path, config)?;
    info!(name, "shared database selected");
    Ok(())
}

/// Closes the shared database. Plain operations fail with
/// [`ConnectionUnavailable`](crate::StoreError::ConnectionUnavailable)
/// until a database is selected again.
pub fn close_database() -> Result<()> {
    SHARED_QUEUE.close()
}

/// A database name must stay a single file name inside the data directory.
fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
