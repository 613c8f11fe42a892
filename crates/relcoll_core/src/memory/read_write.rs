//! Read-write in-memory view.

use relcoll_codec::{decode_row, encode_row, Row};
use tracing::debug;

use crate::collection::{message_to_row, row_to_message, ReadWriteCollection, TransactionRunner};
use crate::context::ReadContext;
use crate::error::{CollError, CollResult};
use crate::memory::collection::MemoryCollection;
use crate::memory::tx::MemoryTx;
use crate::model::Model;
use crate::types::Capabilities;

/// A [`MemoryCollection`] bound to one open [`MemoryTx`].
pub struct MemoryReadWrite<'t, M: Model> {
    handle: MemoryCollection<M>,
    tx: &'t MemoryTx,
}

impl<'t, M: Model> MemoryReadWrite<'t, M> {
    pub(crate) fn new(handle: MemoryCollection<M>, tx: &'t MemoryTx) -> Self {
        Self { handle, tx }
    }

    fn table(&self) -> &str {
        self.handle.schema.table()
    }

    fn encode(&self, key: &str, message: &M::Message) -> CollResult<Vec<u8>> {
        let row = message_to_row::<M>(&self.handle.schema, key, message)?;
        Ok(encode_row(&row)?)
    }

    fn load(&self, key: &str) -> CollResult<Row> {
        match self.tx.lookup(self.table(), key)? {
            Some(bytes) => Ok(decode_row(&bytes)?),
            None => Err(CollError::not_found(self.table(), key)),
        }
    }
}

impl<M: Model> ReadWriteCollection<M> for MemoryReadWrite<'_, M> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn get(&self, key: &str) -> CollResult<M::Message> {
        let row = self.load(key)?;
        if !self.handle.filters.matches(&self.handle.schema, &row)? {
            return Err(CollError::not_found(self.table(), key));
        }
        row_to_message::<M>(&row)
    }

    fn create(&self, key: &str, message: &M::Message) -> CollResult<()> {
        let payload = self.encode(key, message)?;
        self.tx.create(self.table(), key, payload)
    }

    fn put(&self, key: &str, message: &M::Message) -> CollResult<()> {
        let payload = self.encode(key, message)?;
        self.tx.put(self.table(), key, payload)
    }

    fn update<F>(&self, key: &str, mutate: F) -> CollResult<M::Message>
    where
        F: FnOnce(M::Message) -> CollResult<M::Message>,
    {
        let current = row_to_message::<M>(&self.load(key)?)?;
        let updated = mutate(current)?;
        let payload = self.encode(key, &updated)?;
        self.tx.update(self.table(), key, payload)?;
        Ok(updated)
    }

    fn upsert<F>(&self, key: &str, initial: M::Message, mutate: F) -> CollResult<M::Message>
    where
        F: FnOnce(M::Message) -> CollResult<M::Message>,
    {
        let base = match self.load(key) {
            Ok(row) => row_to_message::<M>(&row)?,
            Err(err) if err.is_not_found() => initial,
            Err(err) => return Err(err),
        };
        let updated = mutate(base)?;
        self.put(key, &updated)?;
        Ok(updated)
    }

    fn delete(&self, key: &str) -> CollResult<()> {
        self.tx.delete(self.table(), key)
    }

    fn delete_all(&self) -> CollResult<()> {
        self.tx.clear(self.table())
    }

    /// Takes an exclusive claim on `key`, writes `message` in its own
    /// committed transaction, then runs `f`.
    ///
    /// The context handed to `f` is cancelled and the claim released when
    /// `f` returns. A concurrent claim on the same key fails with `Claimed`.
    fn claim<F>(&self, key: &str, message: &M::Message, f: F) -> CollResult<()>
    where
        F: FnOnce(&ReadContext) -> CollResult<()>,
    {
        let store = self.tx.store();
        let table = self.table();
        let _lease = store.acquire_claim(table, key)?;

        let payload = self.encode(key, message)?;
        store.run_in_transaction(|tx| tx.put(table, key, payload.clone()))?;
        debug!(table, key, "claim acquired");

        let ctx = ReadContext::background();
        let result = f(&ctx);
        ctx.cancel();
        debug!(table, key, ok = result.is_ok(), "claim released");
        result
    }
}
