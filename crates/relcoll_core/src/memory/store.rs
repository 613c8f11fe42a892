//! Revisioned in-memory store.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use thiserror::Error;
use tracing::{debug, info};

use crate::collection::TransactionRunner;
use crate::config::MemoryStoreConfig;
use crate::error::{CollError, CollResult};
use crate::memory::change_feed::ChangeFeed;
use crate::memory::collection::MemoryCollection;
use crate::memory::tx::{MemoryTx, PendingWrite, TxKey};
use crate::model::Model;
use crate::transaction::retry_transaction;
use crate::watch::ChangeEvent;

/// A committed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredRow {
    /// Canonical CBOR of the row.
    pub bytes: Vec<u8>,
    pub create_revision: u64,
    pub mod_revision: u64,
}

pub(crate) type Table = BTreeMap<String, StoredRow>;

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub revision: u64,
    pub tables: HashMap<String, Table>,
}

impl StoreState {
    pub fn row(&self, table: &str, key: &str) -> Option<&StoredRow> {
        self.tables.get(table).and_then(|t| t.get(key))
    }
}

/// Raised at commit when a key read by the transaction changed underneath
/// it. Surfaces as a retryable store error.
#[derive(Debug, Error)]
#[error("{table}/{key} was modified concurrently")]
pub struct WriteConflict {
    /// Table of the conflicting key.
    pub table: String,
    /// Conflicting key.
    pub key: String,
}

struct MemoryInner {
    config: MemoryStoreConfig,
    state: RwLock<StoreState>,
    feed: ChangeFeed,
    claims: Mutex<HashSet<(String, String)>>,
}

/// An in-memory store with a global revision counter, a change feed and
/// per-key claims.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("revision", &self.revision())
            .field("feed", &self.inner.feed)
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::build(MemoryStoreConfig::default())
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new(config: MemoryStoreConfig) -> CollResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MemoryStoreConfig) -> Self {
        info!(watch_history = config.watch_history, "memory store opened");
        Self {
            inner: Arc::new(MemoryInner {
                feed: ChangeFeed::with_max_history(config.watch_history),
                config,
                state: RwLock::new(StoreState::default()),
                claims: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// The configuration the store was created with.
    #[must_use]
    pub fn config(&self) -> &MemoryStoreConfig {
        &self.inner.config
    }

    /// Derives the schema of `M`, registers its table and returns a handle.
    pub fn collection<M: Model>(&self) -> CollResult<MemoryCollection<M>> {
        MemoryCollection::new(self)
    }

    /// Revision of the latest commit.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.state.read().revision
    }

    /// Starts a transaction outside the retrying runner.
    #[must_use]
    pub fn begin(&self) -> MemoryTx {
        MemoryTx::new(self.clone(), 1)
    }

    /// The store's change feed.
    #[must_use]
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.inner.feed
    }

    pub(crate) fn register_table(&self, table: &str) {
        let mut state = self.inner.state.write();
        if !state.tables.contains_key(table) {
            state.tables.insert(table.to_string(), Table::new());
            debug!(table, "table registered");
        }
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner.state.read()
    }

    /// Takes the claim on `(table, key)`, or fails with `Claimed`.
    pub(crate) fn acquire_claim(&self, table: &str, key: &str) -> CollResult<ClaimGuard> {
        let entry = (table.to_string(), key.to_string());
        if !self.inner.claims.lock().insert(entry.clone()) {
            return Err(CollError::Claimed {
                table: entry.0,
                key: entry.1,
            });
        }
        Ok(ClaimGuard {
            store: self.clone(),
            entry,
        })
    }

    /// Validates and applies a transaction's writes atomically.
    ///
    /// Returns the store revision after the commit.
    pub(crate) fn commit(
        &self,
        reads: &HashMap<TxKey, Option<u64>>,
        cleared: &BTreeSet<String>,
        writes: &BTreeMap<TxKey, PendingWrite>,
    ) -> CollResult<u64> {
        let mut state = self.inner.state.write();

        for ((table, key), observed) in reads {
            let current = state.row(table, key).map(|row| row.mod_revision);
            if current != *observed {
                return Err(CollError::store(
                    "commit",
                    WriteConflict {
                        table: table.clone(),
                        key: key.clone(),
                    },
                ));
            }
        }
        for ((table, key), write) in writes {
            let exists = !cleared.contains(table) && state.row(table, key).is_some();
            match write {
                PendingWrite::Create { .. } if exists => {
                    return Err(CollError::already_exists(table.as_str(), key.as_str()));
                }
                PendingWrite::Update { .. } | PendingWrite::Delete { must_exist: true }
                    if !exists =>
                {
                    return Err(CollError::not_found(table.as_str(), key.as_str()));
                }
                _ => {}
            }
        }

        let mut events = Vec::new();
        let StoreState { revision, tables } = &mut *state;
        for table_name in cleared {
            let table = tables.entry(table_name.clone()).or_default();
            for (key, row) in std::mem::take(table) {
                *revision += 1;
                events.push(ChangeEvent::delete(*revision, table_name.as_str(), key, Some(row.bytes)));
            }
        }
        for ((table_name, key), write) in writes {
            let table = tables.entry(table_name.clone()).or_default();
            match write {
                PendingWrite::Create { payload }
                | PendingWrite::Put { payload }
                | PendingWrite::Update { payload } => {
                    *revision += 1;
                    let previous = table.get(key).cloned();
                    let create_revision = previous.as_ref().map_or(*revision, |p| p.create_revision);
                    table.insert(
                        key.clone(),
                        StoredRow {
                            bytes: payload.clone(),
                            create_revision,
                            mod_revision: *revision,
                        },
                    );
                    events.push(ChangeEvent::put(
                        *revision,
                        table_name.as_str(),
                        key.as_str(),
                        payload.clone(),
                        previous.map(|p| p.bytes),
                    ));
                }
                PendingWrite::Delete { .. } => {
                    if let Some(previous) = table.remove(key) {
                        *revision += 1;
                        events.push(ChangeEvent::delete(
                            *revision,
                            table_name.as_str(),
                            key.as_str(),
                            Some(previous.bytes),
                        ));
                    }
                }
            }
        }

        let committed = *revision;
        debug!(revision = committed, events = events.len(), "commit applied");
        // Still under the state lock: watch snapshots are taken under it too.
        self.inner.feed.emit_batch(events);
        Ok(committed)
    }

    fn release_claim(&self, entry: &(String, String)) {
        self.inner.claims.lock().remove(entry);
    }
}

impl TransactionRunner for MemoryStore {
    type Tx = MemoryTx;

    fn run_in_transaction<T, F>(&self, mut work: F) -> CollResult<T>
    where
        F: FnMut(&MemoryTx) -> CollResult<T>,
    {
        retry_transaction(self.inner.config.transaction_attempts, |attempt| {
            let tx = MemoryTx::new(self.clone(), attempt);
            let value = work(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

/// Releases a claim on drop.
pub(crate) struct ClaimGuard {
    store: MemoryStore,
    entry: (String, String),
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.store.release_claim(&self.entry);
    }
}
