//! SQLite active-record engine.
//!
//! Persists [`Model`](activerow_core::Model) types to a single SQLite file
//! through one serialized connection.
//!
//! # Architecture
//!
//! - **`queue`**: [`DatabaseQueue`], the mutual-exclusion gate around the
//!   one connection, and the [`Db`] execution context
//! - **`database`**: the process-wide queue and database selection
//! - **`schema`**: `CREATE`/`DROP TABLE` generation and live column layout
//! - **`convert`**: value binding and row extraction
//! - **`query`**: [`Finder`], lookup by key, ordering, paging, raw SQL
//! - **`record`**: [`Record`], table lifecycle and instance
//!   save/remove/refresh, paging and persistent JSON mapping
//! - **`migration`**: [`Migrator`], versioned, run-once schema changes
//! - **`config`**: [`StoreConfig`], YAML-loadable store settings
//! - **`media`**: [`MediaCache`], URL → cache file locator
//!
//! # Quick start
//!
//! ```no_run
//! use activerow_core::{Model, SchemaBuilder, Value};
//! use activerow_sqlite::{Migrator, Record, set_database_name, shared_queue};
//!
//! #[derive(Default)]
//! struct Account {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Model for Account {
//!     fn describe() -> SchemaBuilder {
//!         SchemaBuilder::new("Account")
//!             .field_of::<i64>("id")
//!             .field_of::<String>("name")
//!     }
//!     fn value_of(&self, field: &str) -> Value {
//!         match field {
//!             "id" => self.id.into(),
//!             "name" => self.name.as_str().into(),
//!             _ => Value::Null,
//!         }
//!     }
//!     fn assign(&mut self, field: &str, value: Value) {
//!         match field {
//!             "id" => self.id = value.decode(),
//!             "name" => self.name = value.decode(),
//!             _ => {}
//!         }
//!     }
//! }
//!
//! set_database_name("alice").unwrap();
//! Migrator::builder()
//!     .step(1, "create accounts", |conn| Account::create_table_in(conn))
//!     .build()
//!     .unwrap()
//!     .perform_needed_migrations(shared_queue())
//!     .unwrap();
//!
//! Account { id: 1, name: "a".into() }.save().unwrap();
//! let account = Account::find(1).unwrap();
//! assert!(account.is_some());
//! ```
//!
//! # Concurrency
//!
//! Every operation blocks until it has run on the shared connection. Calls
//! from any number of threads are serialized; calls made from inside a
//! running operation on the same thread run immediately.

mod config;
mod convert;
mod database;
mod error;
mod media;
mod migration;
mod query;
mod queue;
mod record;
mod schema;

pub use config::{JournalMode, StoreConfig};
pub use convert::{execute, query_rows};
pub use database::{close_database, set_database_name, set_database_name_with, shared_queue};
pub use error::{Result, StoreError};
pub use media::MediaCache;
pub use migration::{
    MigrationReport, MigrationState, MigrationStatus, MigrationStep, Migrator, MigratorBuilder,
    current_version_in,
};
pub use query::{Finder, Key};
pub use queue::{DatabaseQueue, Db, with_transaction};
pub use record::Record;
pub use schema::{
    create_table_sql, drop_table_sql, live_columns, placeholders, quote_ident, table_exists,
};

pub use rusqlite;
