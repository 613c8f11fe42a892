//! Store configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CollError, CollResult};

/// Number of attempts the transaction runners make by default.
pub const DEFAULT_TRANSACTION_ATTEMPTS: usize = 3;

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log. Readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    /// Returns the pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for a SQLite-backed store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// How long a connection waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Journal mode for file databases.
    #[serde(default)]
    pub journal_mode: JournalMode,

    /// Connections kept open for reuse after a view or transaction ends.
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,

    /// Attempts made by the transaction runner before giving up.
    #[serde(default = "default_transaction_attempts")]
    pub transaction_attempts: usize,
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_max_idle_connections() -> usize {
    4
}

const fn default_transaction_attempts() -> usize {
    DEFAULT_TRANSACTION_ATTEMPTS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
            max_idle_connections: default_max_idle_connections(),
            transaction_attempts: default_transaction_attempts(),
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for an in-memory database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for a database file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON configuration document and validates it.
    pub fn from_json_str(json: &str) -> CollResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CollError::configuration(format!("invalid store config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the journal mode.
    #[must_use]
    pub const fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Sets how many idle connections are retained.
    #[must_use]
    pub const fn max_idle_connections(mut self, count: usize) -> Self {
        self.max_idle_connections = count;
        self
    }

    /// Sets the transaction attempt bound.
    #[must_use]
    pub const fn transaction_attempts(mut self, attempts: usize) -> Self {
        self.transaction_attempts = attempts;
        self
    }

    /// Checks the configuration for values the store cannot run with.
    pub fn validate(&self) -> CollResult<()> {
        if self.transaction_attempts == 0 {
            return Err(CollError::configuration(
                "transaction_attempts must be greater than zero",
            ));
        }
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(CollError::configuration("store path must not be empty"));
            }
            if path.is_dir() {
                return Err(CollError::configuration(
                    "store path must be a file, not a directory",
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for the in-memory revisioned store.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStoreConfig {
    /// Change events retained for watchers that resume from a revision.
    #[serde(default = "default_watch_history")]
    pub watch_history: usize,

    /// Attempts made by the transaction runner before giving up.
    #[serde(default = "default_transaction_attempts")]
    pub transaction_attempts: usize,
}

const fn default_watch_history() -> usize {
    10_000
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            watch_history: default_watch_history(),
            transaction_attempts: default_transaction_attempts(),
        }
    }
}

impl MemoryStoreConfig {
    /// Sets the change history size.
    #[must_use]
    pub const fn watch_history(mut self, events: usize) -> Self {
        self.watch_history = events;
        self
    }

    /// Sets the transaction attempt bound.
    #[must_use]
    pub const fn transaction_attempts(mut self, attempts: usize) -> Self {
        self.transaction_attempts = attempts;
        self
    }

    /// Checks the configuration for values the store cannot run with.
    pub fn validate(&self) -> CollResult<()> {
        if self.transaction_attempts == 0 {
            return Err(CollError::configuration(
                "transaction_attempts must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.path.is_none());
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.journal_mode, JournalMode::Wal);
        assert_eq!(config.transaction_attempts, 3);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::file("/tmp/x.db")
            .journal_mode(JournalMode::Delete)
            .busy_timeout(Duration::from_millis(250))
            .transaction_attempts(5);

        assert_eq!(config.path, Some(PathBuf::from("/tmp/x.db")));
        assert_eq!(config.journal_mode, JournalMode::Delete);
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.transaction_attempts, 5);
    }

    #[test]
    fn json_fills_defaults() {
        let config = StoreConfig::from_json_str(r#"{"journal_mode": "delete"}"#).unwrap();
        assert_eq!(config.journal_mode, JournalMode::Delete);
        assert_eq!(config.max_idle_connections, 4);
        assert_eq!(config.transaction_attempts, 3);
    }

    #[test]
    fn json_rejects_zero_attempts() {
        let err = StoreConfig::from_json_str(r#"{"transaction_attempts": 0}"#).unwrap_err();
        assert!(matches!(err, CollError::Configuration { .. }));
    }

    #[test]
    fn json_rejects_unknown_mode() {
        assert!(StoreConfig::from_json_str(r#"{"journal_mode": "truncate"}"#).is_err());
    }

    #[test]
    fn memory_config_validation() {
        assert!(MemoryStoreConfig::default().validate().is_ok());
        assert!(MemoryStoreConfig::default()
            .transaction_attempts(0)
            .validate()
            .is_err());
    }
}
