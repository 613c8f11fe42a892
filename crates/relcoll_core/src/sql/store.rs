//! SQLite store: connection pool, clock and transaction runner.

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};
use uuid::Uuid;

use crate::collection::TransactionRunner;
use crate::config::StoreConfig;
use crate::error::{CollError, CollResult};
use crate::model::Model;
use crate::sql::collection::SqlCollection;
use crate::sql::tx::SqlTx;
use crate::transaction::retry_transaction;

/// Strictly increasing wall clock for bookkeeping columns.
#[derive(Debug, Default)]
pub(crate) struct StoreClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl StoreClock {
    /// Returns the current time, or one nanosecond past the previous
    /// reading if the wall clock has not advanced.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + TimeDelta::nanoseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

struct StoreInner {
    config: StoreConfig,
    location: String,
    idle: Mutex<Vec<Connection>>,
    clock: StoreClock,
    // Keeps a private in-memory database alive while the store exists.
    _anchor: Option<Mutex<Connection>>,
}

/// A SQLite database shared by collection handles.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct SqlStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore")
            .field("location", &self.inner.location)
            .field("idle", &self.idle_connections())
            .finish()
    }
}

impl SqlStore {
    /// Opens a store.
    ///
    /// Without a path the store is a private in-memory database, shared by
    /// every connection of this store and discarded when it is dropped.
    pub fn open(config: StoreConfig) -> CollResult<Self> {
        config.validate()?;
        let (location, in_memory) = match &config.path {
            Some(path) => (path_location(path)?, false),
            None => (format!("file:/relcoll-{}?vfs=memdb", Uuid::new_v4()), true),
        };

        let first = open_connection(&location, &config, in_memory)?;
        let anchor = in_memory.then(|| Mutex::new(first));
        let store = Self {
            inner: Arc::new(StoreInner {
                config,
                location,
                idle: Mutex::new(Vec::new()),
                clock: StoreClock::default(),
                _anchor: anchor,
            }),
        };
        info!(location = %store.inner.location, "store opened");
        Ok(store)
    }

    /// Opens a private in-memory store with default settings.
    pub fn open_in_memory() -> CollResult<Self> {
        Self::open(StoreConfig::new())
    }

    /// Opens (creating if needed) the database file at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> CollResult<Self> {
        Self::open(StoreConfig::file(path.as_ref()))
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// True for stores without a database file.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.inner.config.path.is_none()
    }

    /// Derives the schema of `M`, provisions its table and returns a handle.
    pub fn collection<M: Model>(&self) -> CollResult<SqlCollection<M>> {
        SqlCollection::new(self)
    }

    /// Starts a transaction outside the retrying runner.
    pub fn begin(&self) -> CollResult<SqlTx> {
        SqlTx::begin(self.connection()?, 1)
    }

    /// Connections currently parked in the pool.
    #[must_use]
    pub fn idle_connections(&self) -> usize {
        self.inner.idle.lock().len()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub(crate) fn connection(&self) -> CollResult<PooledConnection> {
        let reused = self.inner.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => open_connection(&self.inner.location, &self.inner.config, self.is_in_memory())?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            store: Arc::clone(&self.inner),
        })
    }
}

impl TransactionRunner for SqlStore {
    type Tx = SqlTx;

    fn run_in_transaction<T, F>(&self, mut work: F) -> CollResult<T>
    where
        F: FnMut(&SqlTx) -> CollResult<T>,
    {
        retry_transaction(self.inner.config.transaction_attempts, |attempt| {
            let tx = SqlTx::begin(self.connection()?, attempt)?;
            let value = work(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

/// A connection on loan from the pool.
///
/// Returned to the pool on drop unless it is mid-transaction or the pool is
/// full.
pub(crate) struct PooledConnection {
    conn: Option<Connection>,
    store: Arc<StoreInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `drop` takes the connection out.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !conn.is_autocommit() {
            debug!("discarding connection with an open transaction");
            return;
        }
        let mut idle = self.store.idle.lock();
        if idle.len() < self.store.config.max_idle_connections {
            idle.push(conn);
        }
    }
}

fn path_location(path: &Path) -> CollResult<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        CollError::configuration(format!("database path is not UTF-8: {}", path.display()))
    })
}

fn open_connection(location: &str, config: &StoreConfig, in_memory: bool) -> CollResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(location, flags)
        .map_err(|err| CollError::store(format!("open {location}"), err))?;
    apply_pragmas(&conn, config, in_memory)
        .map_err(|err| CollError::store(format!("configure {location}"), err))?;
    debug!(location, "connection opened");
    Ok(conn)
}

fn apply_pragmas(
    conn: &Connection,
    config: &StoreConfig,
    in_memory: bool,
) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.execute_batch("PRAGMA case_sensitive_like = ON;")?;
    if !in_memory {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};",
            config.journal_mode.pragma_value()
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = StoreClock::default();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn in_memory_connections_share_one_database() {
        let store = SqlStore::open_in_memory().unwrap();
        {
            let conn = store.connection().unwrap();
            conn.execute_batch("create table t (k varchar)").unwrap();
            conn.execute("insert into t values ('a')", []).unwrap();
        }
        let first = store.connection().unwrap();
        let second = store.connection().unwrap();
        let count: i64 = second
            .query_row("select count(*) from t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        drop(first);
        drop(second);
        assert_eq!(store.idle_connections(), 2);
    }

    #[test]
    fn separate_in_memory_stores_are_isolated() {
        let a = SqlStore::open_in_memory().unwrap();
        let b = SqlStore::open_in_memory().unwrap();
        a.connection()
            .unwrap()
            .execute_batch("create table only_a (k varchar)")
            .unwrap();
        let err = b
            .connection()
            .unwrap()
            .execute_batch("select * from only_a");
        assert!(err.is_err());
    }

    #[test]
    fn pool_is_bounded() {
        let store = SqlStore::open(StoreConfig::new().max_idle_connections(1)).unwrap();
        let a = store.connection().unwrap();
        let b = store.connection().unwrap();
        drop(a);
        drop(b);
        assert_eq!(store.idle_connections(), 1);
    }

    #[test]
    fn rejects_invalid_config() {
        let err = SqlStore::open(StoreConfig::new().transaction_attempts(0)).unwrap_err();
        assert!(matches!(err, CollError::Configuration { .. }));
    }
}
