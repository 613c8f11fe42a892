//! SQLite transactions.

use std::cell::Cell;

use rusqlite::Connection;
use tracing::warn;

use crate::error::{CollError, CollResult};
use crate::sql::store::PooledConnection;

/// An open `begin immediate` transaction on a pooled connection.
///
/// Dropping an uncommitted transaction rolls it back.
pub struct SqlTx {
    conn: PooledConnection,
    attempt: usize,
    finished: Cell<bool>,
}

impl std::fmt::Debug for SqlTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlTx")
            .field("attempt", &self.attempt)
            .field("finished", &self.finished.get())
            .finish()
    }
}

impl SqlTx {
    pub(crate) fn begin(conn: PooledConnection, attempt: usize) -> CollResult<Self> {
        conn.execute_batch("begin immediate")
            .map_err(|err| CollError::store("begin transaction", err))?;
        Ok(Self {
            conn,
            attempt,
            finished: Cell::new(false),
        })
    }

    /// Which runner attempt this transaction belongs to, starting at 1.
    #[must_use]
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Commits the transaction.
    pub fn commit(self) -> CollResult<()> {
        self.conn
            .execute_batch("commit")
            .map_err(|err| CollError::store("commit transaction", err))?;
        self.finished.set(true);
        Ok(())
    }

    /// Rolls the transaction back.
    pub fn rollback(self) -> CollResult<()> {
        self.finished.set(true);
        self.conn
            .execute_batch("rollback")
            .map_err(|err| CollError::store("rollback transaction", err))
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for SqlTx {
    fn drop(&mut self) {
        if self.finished.get() || self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("rollback") {
            warn!(error = %err, "rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sql::SqlStore;

    fn store_with_table() -> SqlStore {
        let store = SqlStore::open_in_memory().unwrap();
        store
            .connection()
            .unwrap()
            .execute_batch("create table t (k varchar primary key)")
            .unwrap();
        store
    }

    fn count(store: &SqlStore) -> i64 {
        store
            .connection()
            .unwrap()
            .query_row("select count(*) from t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn commit_persists() {
        let store = store_with_table();
        let tx = store.begin().unwrap();
        tx.conn().execute("insert into t values ('a')", []).unwrap();
        tx.commit().unwrap();
        assert_eq!(count(&store), 1);
    }

    #[test]
    fn drop_rolls_back() {
        let store = store_with_table();
        {
            let tx = store.begin().unwrap();
            tx.conn().execute("insert into t values ('a')", []).unwrap();
        }
        assert_eq!(count(&store), 0);
        assert_eq!(store.idle_connections(), 1);
    }

    #[test]
    fn explicit_rollback() {
        let store = store_with_table();
        let tx = store.begin().unwrap();
        tx.conn().execute("insert into t values ('a')", []).unwrap();
        tx.rollback().unwrap();
        assert_eq!(count(&store), 0);
    }
}
