//! Buffered in-memory transactions.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{CollError, CollResult};
use crate::memory::store::MemoryStore;

/// `(table, key)`.
pub(crate) type TxKey = (String, String);

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A buffered write, validated again at commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    /// Strict insert: the key must not exist at commit.
    Create { payload: Vec<u8> },
    /// Insert or replace.
    Put { payload: Vec<u8> },
    /// Replace: the key must still exist at commit.
    Update { payload: Vec<u8> },
    /// Removal. `must_exist` is set when the key was seen committed.
    Delete { must_exist: bool },
}

/// An open transaction on a [`MemoryStore`].
///
/// Writes are buffered and become visible to other readers only on commit.
/// Reads through the transaction see its own writes. Keys read from
/// committed state are checked again at commit; if one changed, the commit
/// fails with a retryable store error.
pub struct MemoryTx {
    store: MemoryStore,
    attempt: usize,
    state: Cell<TransactionState>,
    writes: RefCell<BTreeMap<TxKey, PendingWrite>>,
    reads: RefCell<HashMap<TxKey, Option<u64>>>,
    cleared: RefCell<BTreeSet<String>>,
}

impl std::fmt::Debug for MemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTx")
            .field("attempt", &self.attempt)
            .field("state", &self.state.get())
            .field("writes", &self.write_count())
            .finish()
    }
}

impl MemoryTx {
    pub(crate) fn new(store: MemoryStore, attempt: usize) -> Self {
        Self {
            store,
            attempt,
            state: Cell::new(TransactionState::Active),
            writes: RefCell::new(BTreeMap::new()),
            reads: RefCell::new(HashMap::new()),
            cleared: RefCell::new(BTreeSet::new()),
        }
    }

    /// Which runner attempt this transaction belongs to, starting at 1.
    #[must_use]
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state.get()
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }

    pub(crate) fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Commits, returning the store revision after the commit.
    pub fn commit(self) -> CollResult<u64> {
        self.ensure_active()?;
        let result = self.store.commit(
            &self.reads.borrow(),
            &self.cleared.borrow(),
            &self.writes.borrow(),
        );
        self.state.set(match result {
            Ok(_) => TransactionState::Committed,
            Err(_) => TransactionState::Aborted,
        });
        result
    }

    /// Discards every buffered write.
    pub fn rollback(self) {
        self.state.set(TransactionState::Aborted);
    }

    fn ensure_active(&self) -> CollResult<()> {
        match self.state.get() {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CollError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(CollError::invalid_operation("transaction already aborted"))
            }
        }
    }

    /// Current bytes for `key` as seen by this transaction.
    pub(crate) fn lookup(&self, table: &str, key: &str) -> CollResult<Option<Vec<u8>>> {
        self.ensure_active()?;
        let tx_key = (table.to_string(), key.to_string());
        if let Some(write) = self.writes.borrow().get(&tx_key) {
            return Ok(match write {
                PendingWrite::Create { payload }
                | PendingWrite::Put { payload }
                | PendingWrite::Update { payload } => Some(payload.clone()),
                PendingWrite::Delete { .. } => None,
            });
        }
        if self.cleared.borrow().contains(table) {
            return Ok(None);
        }

        let state = self.store.read_state();
        let row = state.row(table, key);
        self.reads
            .borrow_mut()
            .entry(tx_key)
            .or_insert_with(|| row.map(|r| r.mod_revision));
        Ok(row.map(|r| r.bytes.clone()))
    }

    pub(crate) fn create(&self, table: &str, key: &str, payload: Vec<u8>) -> CollResult<()> {
        if self.lookup(table, key)?.is_some() {
            return Err(CollError::already_exists(table, key));
        }
        let tx_key = (table.to_string(), key.to_string());
        let mut writes = self.writes.borrow_mut();
        let write = match writes.get(&tx_key) {
            Some(PendingWrite::Delete { .. }) => PendingWrite::Put { payload },
            _ if self.cleared.borrow().contains(table) => PendingWrite::Put { payload },
            _ => PendingWrite::Create { payload },
        };
        writes.insert(tx_key, write);
        Ok(())
    }

    pub(crate) fn put(&self, table: &str, key: &str, payload: Vec<u8>) -> CollResult<()> {
        self.ensure_active()?;
        let tx_key = (table.to_string(), key.to_string());
        let mut writes = self.writes.borrow_mut();
        let write = match writes.get(&tx_key) {
            Some(PendingWrite::Create { .. }) => PendingWrite::Create { payload },
            _ => PendingWrite::Put { payload },
        };
        writes.insert(tx_key, write);
        Ok(())
    }

    pub(crate) fn update(&self, table: &str, key: &str, payload: Vec<u8>) -> CollResult<()> {
        if self.lookup(table, key)?.is_none() {
            return Err(CollError::not_found(table, key));
        }
        let tx_key = (table.to_string(), key.to_string());
        let mut writes = self.writes.borrow_mut();
        let write = match writes.get(&tx_key) {
            Some(PendingWrite::Create { .. }) => PendingWrite::Create { payload },
            Some(PendingWrite::Put { .. }) => PendingWrite::Put { payload },
            _ => PendingWrite::Update { payload },
        };
        writes.insert(tx_key, write);
        Ok(())
    }

    pub(crate) fn delete(&self, table: &str, key: &str) -> CollResult<()> {
        if self.lookup(table, key)?.is_none() {
            return Err(CollError::not_found(table, key));
        }
        let tx_key = (table.to_string(), key.to_string());
        let mut writes = self.writes.borrow_mut();
        match writes.get(&tx_key) {
            Some(PendingWrite::Create { .. }) => {
                writes.remove(&tx_key);
            }
            Some(PendingWrite::Put { .. }) => {
                writes.insert(tx_key, PendingWrite::Delete { must_exist: false });
            }
            _ => {
                writes.insert(tx_key, PendingWrite::Delete { must_exist: true });
            }
        }
        Ok(())
    }

    pub(crate) fn clear(&self, table: &str) -> CollResult<()> {
        self.ensure_active()?;
        self.writes.borrow_mut().retain(|(t, _), _| t != table);
        self.cleared.borrow_mut().insert(table.to_string());
        Ok(())
    }
}
