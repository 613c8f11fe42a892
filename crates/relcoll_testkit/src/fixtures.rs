//! Store fixtures.
//!
//! Convenience constructors for stores that clean up after themselves,
//! plus one-time tracing setup for test binaries.

use std::path::PathBuf;
use std::sync::Once;

use relcoll_core::{
    CollectionHandle, MemoryStore, Model, ReadWriteCollection, SqlStore, StoreConfig,
    TransactionRunner,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::models::FileRecord;

/// A SQLite store with automatic cleanup.
pub struct TestSqlStore {
    /// The store.
    pub store: SqlStore,
    _temp_dir: Option<TempDir>,
}

impl TestSqlStore {
    /// A private in-memory database.
    pub fn memory() -> Self {
        Self {
            store: SqlStore::open_in_memory().expect("failed to open in-memory store"),
            _temp_dir: None,
        }
    }

    /// A database file inside a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with(StoreConfig::new())
    }

    /// Like [`TestSqlStore::file`], with the remaining settings from `config`.
    pub fn file_with(config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let config = StoreConfig {
            path: Some(temp_dir.path().join("test.db")),
            ..config
        };
        Self {
            store: SqlStore::open(config).expect("failed to open file store"),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Path of the database file, if file-backed.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("test.db"))
    }

    /// Opens a second store on the same file.
    pub fn reopen(&self) -> Option<SqlStore> {
        let path = self.path()?;
        Some(SqlStore::open_path(path).expect("failed to reopen store"))
    }
}

impl std::ops::Deref for TestSqlStore {
    type Target = SqlStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A fresh in-memory revisioned store.
pub fn memory_store() -> MemoryStore {
    MemoryStore::default()
}

/// Runs `f` with a collection of `M` on a throwaway SQLite database.
pub fn with_sql_collection<M, F, R>(f: F) -> R
where
    M: Model,
    F: FnOnce(&SqlStore, relcoll_core::SqlCollection<M>) -> R,
{
    let test_store = TestSqlStore::memory();
    let collection = test_store
        .collection::<M>()
        .expect("failed to build collection");
    f(&test_store.store, collection)
}

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Pre-populated data sets.
pub mod scenarios {
    use super::*;

    /// Owners cycled through by [`populate`].
    pub const OWNERS: [&str; 3] = ["ann", "bob", "cat"];

    /// Writes `count` files named `file/0000`, `file/0001`, ... in one
    /// transaction. Sizes equal the index; owners cycle through [`OWNERS`].
    pub fn populate<H: CollectionHandle<FileRecord>>(handle: &H, count: usize) {
        handle
            .runner()
            .run_in_transaction(|tx| {
                let rw = handle.read_write(tx);
                for i in 0..count {
                    let name = file_name(i);
                    rw.create(&name, &FileRecord::new(&name, i as i64, OWNERS[i % OWNERS.len()]))?;
                }
                Ok(())
            })
            .expect("failed to populate collection");
    }

    /// Primary key used by [`populate`] for index `i`.
    pub fn file_name(i: usize) -> String {
        format!("file/{i:04}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relcoll_core::{ReadContext, ReadOnlyCollection};

    #[test]
    fn memory_sql_store() {
        let store = TestSqlStore::memory();
        assert!(store.is_in_memory());
        assert!(store.path().is_none());
    }

    #[test]
    fn file_store_reopens() {
        let store = TestSqlStore::file();
        let files = store.collection::<FileRecord>().unwrap();
        scenarios::populate(&files, 5);

        let reopened = store.reopen().unwrap();
        let files = reopened.collection::<FileRecord>().unwrap();
        let count = files.read_only(&ReadContext::background()).count().unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn populated_memory_store() {
        let store = memory_store();
        let files = store.collection::<FileRecord>().unwrap();
        scenarios::populate(&files, 4);
        let view = files.read_only(&ReadContext::background());
        assert_eq!(view.count().unwrap(), 4);
        assert_eq!(view.get(&scenarios::file_name(3)).unwrap().owner, "ann");
    }

    #[test]
    fn scoped_sql_collection() {
        let count = with_sql_collection::<FileRecord, _, _>(|_, files| {
            scenarios::populate(&files, 2);
            files.read_only(&ReadContext::background()).count().unwrap()
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn tracing_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
