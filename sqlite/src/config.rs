//! Store configuration.
//!
//! Controls where database files and cached media live and which pragmas
//! are applied to every opened connection. Loadable from YAML.
//!
//! # Example YAML
//!
//! ```yaml
//! data_dir: /var/lib/myapp
//! media_cache_dir: /var/cache/myapp/media
//! journal_mode: wal
//! busy_timeout_ms: 5000
//! foreign_keys: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// SQLite journal mode applied on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Memory,
}

impl JournalMode {
    pub fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

/// Settings for opening the shared database.
///
/// # Examples
///
/// ```
/// use activerow_sqlite::{JournalMode, StoreConfig};
///
/// let config = StoreConfig::default();
/// assert_eq!(config.journal_mode, JournalMode::Wal);
/// assert!(config.database_path("alice").ends_with("alice.sqlite"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `<name>.sqlite` database files.
    pub data_dir: PathBuf,
    /// Root directory of the media cache.
    pub media_cache_dir: PathBuf,
    /// Journal mode pragma.
    pub journal_mode: JournalMode,
    /// How long SQLite waits on a lock held by another process.
    pub busy_timeout_ms: u64,
    /// Whether foreign key enforcement is enabled.
    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            media_cache_dir: PathBuf::from("media-cache"),
            journal_mode: JournalMode::Wal,
            busy_timeout_ms: 5000,
            foreign_keys: true,
        }
    }
}

impl StoreConfig {
    /// Loads configuration from a YAML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::StoreError::IoError) if the file cannot be
    /// read, or [`ConfigError`](crate::StoreError::ConfigError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Path of the database file for `name`.
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.sqlite"))
    }

    /// Pragmas applied to each opened connection.
    pub(crate) fn pragma_sql(&self) -> String {
        format!(
            "PRAGMA journal_mode = {};\nPRAGMA busy_timeout = {};\nPRAGMA foreign_keys = {};",
            self.journal_mode.pragma_value(),
            self.busy_timeout_ms,
            if self.foreign_keys { "ON" } else { "OFF" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");

        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
            journal_mode: JournalMode::Delete,
            busy_timeout_ms: 250,
            ..StoreConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");
        std::fs::write(&path, "journal_mode: memory\n").unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded.journal_mode, JournalMode::Memory);
        assert_eq!(loaded.busy_timeout_ms, 5000);
        assert!(loaded.foreign_keys);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = StoreConfig::load("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, crate::StoreError::IoError(_)));
    }

    #[test]
    fn test_pragma_sql() {
        let sql = StoreConfig::default().pragma_sql();
        assert!(sql.contains("journal_mode = WAL"));
        assert!(sql.contains("busy_timeout = 5000"));
        assert!(sql.contains("foreign_keys = ON"));
    }
}
