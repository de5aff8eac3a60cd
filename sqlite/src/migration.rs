//! Versioned schema migrations.
//!
//! A [`Migrator`] holds a fixed set of [`MigrationStep`]s, each tagged with
//! a positive version. The highest successfully applied version is stored
//! in the database's `schema_version` table. [`perform_needed_migrations`]
//! applies every step above that version in ascending order; each step runs
//! in its own transaction together with the version bump, so a failed step
//! leaves neither its effects nor a new version behind.
//!
//! [`perform_needed_migrations`]: Migrator::perform_needed_migrations
//!
//! # Example
//!
//! ```
//! use activerow_sqlite::{DatabaseQueue, Migrator};
//!
//! let queue = DatabaseQueue::open_in_memory().unwrap();
//! let migrator = Migrator::builder()
//!     .step(2, "add email", |conn| {
//!         conn.execute_batch("ALTER TABLE users ADD COLUMN email TEXT")?;
//!         Ok(())
//!     })
//!     .step(1, "create users", |conn| {
//!         conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let report = migrator.perform_needed_migrations(&queue).unwrap();
//! assert_eq!(report.applied, vec![1, 2]);
//!
//! // Running again is a no-op.
//! let report = migrator.perform_needed_migrations(&queue).unwrap();
//! assert!(report.applied.is_empty());
//! assert_eq!(report.to_version, 2);
//! ```

use std::collections::HashSet;
use std::fmt;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, error, info, warn};

use crate::error::{Result, StoreError};
use crate::queue::{Db, with_transaction};
use crate::schema::table_exists;

const VERSION_TABLE: &str = "schema_version";

type ApplyFn = Box<dyn Fn(&Connection) -> Result<()> + Send + Sync>;

/// One versioned, run-once schema change.
pub struct MigrationStep {
    version: i64,
    name: String,
    apply: ApplyFn,
}

impl MigrationStep {
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Collects steps for a [`Migrator`].
#[derive(Default)]
pub struct MigratorBuilder {
    steps: Vec<MigrationStep>,
}

impl MigratorBuilder {
    /// Adds a step. Steps may be declared in any order.
    pub fn step<F>(mut self, version: i64, name: impl Into<String>, apply: F) -> Self
    where
        F: Fn(&Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.steps.push(MigrationStep {
            version,
            name: name.into(),
            apply: Box::new(apply),
        });
        self
    }

    /// Validates the step set and sorts it by version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MigrationError`] if a version is zero or
    /// negative, or appears more than once.
    pub fn build(mut self) -> Result<Migrator> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.version <= 0 {
                return Err(StoreError::MigrationError(format!(
                    "step '{}' has non-positive version {}",
                    step.name, step.version
                )));
            }
            if !seen.insert(step.version) {
                return Err(StoreError::MigrationError(format!(
                    "version {} is declared more than once",
                    step.version
                )));
            }
        }
        self.steps.sort_by_key(|s| s.version);
        Ok(Migrator {
            steps: self.steps,
            state: Mutex::new(MigrationState::Uninitialized),
        })
    }
}

/// Progress of a migrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// No run has started, or the last run could not read the stored
    /// version.
    Uninitialized,
    /// Reading the stored version.
    Checking,
    /// Applying the step with this version.
    Applying(i64),
    /// Every step has been applied.
    UpToDate,
    /// The step with this version failed; the stored version is the one
    /// before it.
    Failed(i64),
}

/// Outcome of [`Migrator::perform_needed_migrations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Stored version before the run.
    pub from_version: i64,
    /// Stored version after the run.
    pub to_version: i64,
    /// Versions applied by this run, ascending.
    pub applied: Vec<i64>,
}

/// Snapshot returned by [`Migrator::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Stored version (0 for a fresh database).
    pub current_version: i64,
    /// Highest declared version (0 with no steps).
    pub latest_version: i64,
    /// Versions that a run would apply, ascending.
    pub pending: Vec<i64>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies versioned steps exactly once each, in ascending order.
pub struct Migrator {
    steps: Vec<MigrationStep>,
    state: Mutex<MigrationState>,
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("steps", &self.steps)
            .field("state", &self.state())
            .finish()
    }
}

impl Migrator {
    pub fn builder() -> MigratorBuilder {
        MigratorBuilder::default()
    }

    /// Steps in ascending version order.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn latest_version(&self) -> i64 {
        self.steps.last().map_or(0, |s| s.version)
    }

    pub fn state(&self) -> MigrationState {
        *self.state.lock()
    }

    fn set_state(&self, state: MigrationState) {
        *self.state.lock() = state;
    }

    /// Applies every step whose version is above the stored version.
    ///
    /// The whole run holds the connection, so no other operation observes
    /// a partially migrated schema. Idempotent: a second run applies
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MigrationFailed`] carrying the failed step's
    /// version and cause; earlier steps stay applied and the stored version
    /// stays at the last of them.
    pub fn perform_needed_migrations<'a>(&self, db: impl Into<Db<'a>>) -> Result<MigrationReport> {
        db.into().run(|conn| self.migrate(conn))
    }

    fn migrate(&self, conn: &Connection) -> Result<MigrationReport> {
        self.set_state(MigrationState::Checking);
        let from_version = match self.check(conn) {
            Ok(version) => version,
            Err(e) => {
                error!(error = %e, "could not read schema version");
                self.set_state(MigrationState::Uninitialized);
                return Err(e);
            }
        };
        debug!(from_version, latest = self.latest_version(), "checking migrations");
        if from_version > self.latest_version() {
            warn!(
                stored = from_version,
                latest = self.latest_version(),
                "database is newer than the declared migrations"
            );
        }

        let mut applied = Vec::new();
        let mut current = from_version;
        for step in self.steps.iter().filter(|s| s.version > from_version) {
            self.set_state(MigrationState::Applying(step.version));
            info!(version = step.version, name = %step.name, "applying migration");

            let result = with_transaction(conn, |tx| {
                (step.apply)(tx)?;
                set_version(tx, step.version)
            });
            if let Err(e) = result {
                error!(version = step.version, name = %step.name, error = %e, "migration failed");
                self.set_state(MigrationState::Failed(step.version));
                return Err(e.in_migration(step.version));
            }
            applied.push(step.version);
            current = step.version;
        }

        self.set_state(MigrationState::UpToDate);
        if !applied.is_empty() {
            info!(from_version, to_version = current, count = applied.len(), "migrations complete");
        }
        Ok(MigrationReport {
            from_version,
            to_version: current,
            applied,
        })
    }

    fn check(&self, conn: &Connection) -> Result<i64> {
        ensure_version_table(conn)?;
        current_version_in(conn)
    }

    /// Reports the stored version and pending steps without changing
    /// anything.
    pub fn status<'a>(&self, db: impl Into<Db<'a>>) -> Result<MigrationStatus> {
        let current_version = db.into().run(current_version_in)?;
        Ok(MigrationStatus {
            current_version,
            latest_version: self.latest_version(),
            pending: self
                .steps
                .iter()
                .map(|s| s.version)
                .filter(|&v| v > current_version)
                .collect(),
        })
    }
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {VERSION_TABLE} (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );
        INSERT OR IGNORE INTO {VERSION_TABLE} (id, version) VALUES (1, 0);"
    ))?;
    Ok(())
}

fn set_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute(
        &format!("UPDATE {VERSION_TABLE} SET version = ?1 WHERE id = 1"),
        [version],
    )?;
    Ok(())
}

/// Stored schema version; 0 when the version table does not exist yet.
pub fn current_version_in(conn: &Connection) -> Result<i64> {
    if !table_exists(conn, VERSION_TABLE)? {
        return Ok(0);
    }
    let version: Option<i64> = conn
        .query_row(
            &format!("SELECT version FROM {VERSION_TABLE} WHERE id = 1"),
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::DatabaseQueue;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create(table: &'static str) -> impl Fn(&Connection) -> Result<()> + Send + Sync {
        move |conn| {
            conn.execute_batch(&format!("CREATE TABLE {table} (id INTEGER PRIMARY KEY)"))?;
            Ok(())
        }
    }

    #[test]
    fn test_build_rejects_invalid_versions() {
        let err = Migrator::builder().step(0, "zero", create("a")).build().unwrap_err();
        assert!(matches!(err, StoreError::MigrationError(_)));

        let err = Migrator::builder()
            .step(1, "a", create("a"))
            .step(1, "b", create("b"))
            .build()
            .unwrap_err();
        assert!(matches!(err, StoreError::MigrationError(ref m) if m.contains("more than once")));
    }

    #[test]
    fn test_steps_sorted_ascending() {
        let migrator = Migrator::builder()
            .step(3, "c", create("c"))
            .step(1, "a", create("a"))
            .step(2, "b", create("b"))
            .build()
            .unwrap();
        let versions: Vec<i64> = migrator.steps().iter().map(|s| s.version()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(migrator.latest_version(), 3);
        assert_eq!(migrator.state(), MigrationState::Uninitialized);
    }

    #[test]
    fn test_each_step_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let migrator = Migrator::builder()
            .step(1, "count", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        let queue = DatabaseQueue::open_in_memory().unwrap();

        migrator.perform_needed_migrations(&queue).unwrap();
        migrator.perform_needed_migrations(&queue).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(migrator.state(), MigrationState::UpToDate);
    }

    #[test]
    fn test_failed_step_rolls_back_and_keeps_version() {
        let migrator = Migrator::builder()
            .step(1, "a", create("a"))
            .step(2, "half done", |conn| {
                conn.execute_batch("CREATE TABLE b (id INTEGER)")?;
                conn.execute_batch("THIS IS NOT SQL")?;
                Ok(())
            })
            .step(3, "c", create("c"))
            .build()
            .unwrap();
        let queue = DatabaseQueue::open_in_memory().unwrap();

        let err = migrator.perform_needed_migrations(&queue).unwrap_err();
        assert!(matches!(err, StoreError::MigrationFailed { version: 2, .. }));
        assert_eq!(migrator.state(), MigrationState::Failed(2));

        queue
            .submit(|conn| {
                assert_eq!(current_version_in(conn)?, 1);
                assert!(table_exists(conn, "a")?);
                assert!(!table_exists(conn, "b")?);
                assert!(!table_exists(conn, "c")?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_unreadable_version_table_resets_state() {
        let migrator = Migrator::builder().step(1, "a", create("a")).build().unwrap();
        let queue = DatabaseQueue::open_in_memory().unwrap();
        queue
            .submit(|conn| Ok(conn.execute_batch("CREATE TABLE schema_version (label TEXT)")?))
            .unwrap();

        let err = migrator.perform_needed_migrations(&queue).unwrap_err();
        assert!(matches!(err, StoreError::DatabaseError(_)));
        assert_eq!(migrator.state(), MigrationState::Uninitialized);
        queue
            .submit(|conn| {
                assert!(!table_exists(conn, "a")?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_status_reports_pending() {
        let migrator = Migrator::builder()
            .step(1, "a", create("a"))
            .step(2, "b", create("b"))
            .build()
            .unwrap();
        let queue = DatabaseQueue::open_in_memory().unwrap();

        let status = migrator.status(&queue).unwrap();
        assert_eq!(status.current_version, 0);
        assert_eq!(status.pending, vec![1, 2]);
        assert!(!status.is_up_to_date());

        migrator.perform_needed_migrations(&queue).unwrap();
        let status = migrator.status(&queue).unwrap();
        assert_eq!(status.current_version, 2);
        assert!(status.is_up_to_date());
    }

    #[test]
    fn test_new_steps_apply_on_top_of_stored_version() {
        let queue = DatabaseQueue::open_in_memory().unwrap();
        Migrator::builder()
            .step(1, "a", create("a"))
            .build()
            .unwrap()
            .perform_needed_migrations(&queue)
            .unwrap();

        let report = Migrator::builder()
            .step(1, "a", create("a"))
            .step(2, "b", create("b"))
            .build()
            .unwrap()
            .perform_needed_migrations(&queue)
            .unwrap();
        assert_eq!(report.from_version, 1);
        assert_eq!(report.applied, vec![2]);
    }
}
