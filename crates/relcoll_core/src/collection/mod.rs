//! The backend-neutral collection contract.
//!
//! A [`CollectionHandle`] binds a model to a store. It is cheap to clone and
//! never mutated: [`CollectionHandle::with`] returns a new handle carrying
//! one more equality filter. Handles produce views:
//!
//! - [`ReadOnlyCollection`] bound to a [`ReadContext`], usable concurrently.
//! - [`ReadWriteCollection`] bound to one open transaction, single writer.
//!
//! Transactions come from the store's [`TransactionRunner`].

mod filter;
mod record;

pub use filter::Filters;
pub(crate) use record::{message_to_row, row_to_message};

use relcoll_codec::Value;

use crate::context::ReadContext;
use crate::error::CollResult;
use crate::model::Model;
use crate::schema::{Index, SchemaInfo};
use crate::types::{Capabilities, ListOptions};
use crate::watch::{WatchOptions, Watcher};

/// Runs units of work inside store transactions.
pub trait TransactionRunner {
    /// The open transaction handed to the unit of work.
    type Tx;

    /// Runs `work` in a fresh transaction, committing when it succeeds.
    ///
    /// Transient store failures (in `work`, begin or commit) roll the
    /// transaction back and start a new attempt, up to the configured bound.
    /// Domain errors are returned from the first attempt that produced them.
    fn run_in_transaction<T, F>(&self, work: F) -> CollResult<T>
    where
        F: FnMut(&Self::Tx) -> CollResult<T>;
}

/// An immutable binding of a model to a store.
pub trait CollectionHandle<M: Model>: Clone + Send + Sync {
    /// Transaction runner of the backing store.
    type Runner: TransactionRunner;
    /// Read-only view type.
    type ReadOnly: ReadOnlyCollection<M>;
    /// Read-write view type, borrowing the transaction it is bound to.
    type ReadWrite<'t>: ReadWriteCollection<M>;

    /// The schema derived when the handle was built.
    fn schema(&self) -> &SchemaInfo;

    /// The backing store's transaction runner.
    fn runner(&self) -> &Self::Runner;

    /// Optional operations this backend supports.
    fn capabilities(&self) -> Capabilities;

    /// Equality filters applied to reads through this handle.
    fn filters(&self) -> &Filters;

    /// Returns a handle that also requires `field == value` on every read.
    #[must_use]
    fn with(&self, field: &str, value: impl Into<Value>) -> Self;

    /// Binds a read-only view to `ctx`.
    fn read_only(&self, ctx: &ReadContext) -> Self::ReadOnly;

    /// Binds a read-write view to an open transaction.
    fn read_write<'t>(
        &self,
        tx: &'t <Self::Runner as TransactionRunner>::Tx,
    ) -> Self::ReadWrite<'t>;
}

/// Reads outside a transaction.
///
/// Every read honors the handle's filters. Listing streams one message per
/// matching row into the callback; an error from the callback stops the
/// scan and is returned unchanged.
pub trait ReadOnlyCollection<M: Model> {
    /// Optional operations this view supports.
    fn capabilities(&self) -> Capabilities;

    /// Looks up one record by primary key.
    fn get(&self, key: &str) -> CollResult<M::Message>;

    /// Returns the first record whose indexed field equals `value`.
    fn get_by_index(&self, index: &Index, value: impl Into<Value>) -> CollResult<M::Message>;

    /// Streams every record whose indexed field equals `value`.
    fn list_by_index<F>(
        &self,
        index: &Index,
        value: impl Into<Value>,
        opts: &ListOptions,
        f: F,
    ) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>;

    /// Streams every record.
    fn list<F>(&self, opts: &ListOptions, f: F) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>;

    /// Streams every record whose key starts with `prefix`, matched literally.
    fn list_prefix<F>(&self, prefix: &str, opts: &ListOptions, f: F) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>;

    /// Counts matching records.
    fn count(&self) -> CollResult<i64>;

    /// Watches every record in the collection.
    fn watch(&self, opts: &WatchOptions) -> CollResult<Watcher<M>>;

    /// Watches a single key.
    fn watch_one(&self, key: &str, opts: &WatchOptions) -> CollResult<Watcher<M>>;

    /// Watches records whose indexed field equals `value`.
    fn watch_by_index(
        &self,
        index: &Index,
        value: impl Into<Value>,
        opts: &WatchOptions,
    ) -> CollResult<Watcher<M>>;
}

/// Reads and writes inside one transaction.
///
/// Writes address rows by primary key. The record's own primary key must
/// equal the `key` argument.
pub trait ReadWriteCollection<M: Model> {
    /// Optional operations this view supports.
    fn capabilities(&self) -> Capabilities;

    /// Looks up one record, observing this transaction's own writes.
    fn get(&self, key: &str) -> CollResult<M::Message>;

    /// Inserts a new record. Fails with `AlreadyExists` if the key is taken.
    fn create(&self, key: &str, message: &M::Message) -> CollResult<()>;

    /// Inserts or replaces a record.
    fn put(&self, key: &str, message: &M::Message) -> CollResult<()>;

    /// Loads the stored record, transforms it and writes the result back.
    ///
    /// Fails with `NotFound` without calling `mutate` if the key is absent.
    fn update<F>(&self, key: &str, mutate: F) -> CollResult<M::Message>
    where
        F: FnOnce(M::Message) -> CollResult<M::Message>;

    /// Like [`ReadWriteCollection::update`], but starts from `initial` when
    /// the key is absent, then writes with [`ReadWriteCollection::put`].
    fn upsert<F>(&self, key: &str, initial: M::Message, mutate: F) -> CollResult<M::Message>
    where
        F: FnOnce(M::Message) -> CollResult<M::Message>;

    /// Deletes a record. Fails with `NotFound` if no row was removed.
    fn delete(&self, key: &str) -> CollResult<()>;

    /// Deletes every record in the table within this transaction.
    fn delete_all(&self) -> CollResult<()>;

    /// Writes `message` under `key` and runs `f` while holding an exclusive
    /// claim on it.
    fn claim<F>(&self, key: &str, message: &M::Message, f: F) -> CollResult<()>
    where
        F: FnOnce(&ReadContext) -> CollResult<()>;
}
