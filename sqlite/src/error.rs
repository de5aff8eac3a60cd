//! Error types for storage operations.
//!
//! Provides a unified error type covering connection lifecycle, model
//! registration, mapping, migrations, queries and configuration.

use std::path::PathBuf;

use activerow_core::{ConversionError, MappingError, SchemaError};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The access queue has no open connection.
    #[error("database connection unavailable")]
    ConnectionUnavailable,

    /// The connection cannot be closed or replaced while an operation on
    /// the current thread is using it.
    #[error("database connection is in use by a running operation")]
    ConnectionInUse,

    /// Opening the database file failed.
    #[error("failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Model registration failure (invalid description).
    #[error("schema registration error: {0}")]
    Schema(#[from] SchemaError),

    /// Row or payload mapping failure.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Value coercion failure.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// A migration step failed; the schema version stays at the last
    /// successfully applied step.
    #[error("migration {version} failed: {source}")]
    MigrationFailed {
        version: i64,
        #[source]
        source: Box<StoreError>,
    },

    /// The migration step set is invalid (duplicate or non-positive versions).
    #[error("migration error: {0}")]
    MigrationError(String),

    /// A database name that would not resolve to a file directly inside the
    /// data directory.
    #[error("invalid database name '{0}'")]
    InvalidDatabaseName(String),

    /// A row expected to exist is gone.
    #[error("record not found in {table}")]
    RecordNotFound { table: String },

    /// Malformed SQL, an unknown column, or a parameter-count mismatch.
    #[error("query error: {0}")]
    QueryError(String),

    /// SQLite operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration file could not be parsed or written.
    #[error("config error: {0}")]
    ConfigError(#[from] serde_yaml::Error),
}

impl StoreError {
    /// Wraps `self` as the cause of a failed migration step.
    pub(crate) fn in_migration(self, version: i64) -> Self {
        StoreError::MigrationFailed {
            version,
            source: Box::new(self),
        }
    }

    /// Returns `true` for errors that mean "no such row".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::RecordNotFound { .. })
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
