//! Read-write SQLite view.

use relcoll_codec::Value;

use crate::collection::{message_to_row, row_to_message, ReadWriteCollection};
use crate::context::ReadContext;
use crate::error::{CollError, CollResult};
use crate::model::Model;
use crate::sql::collection::SqlCollection;
use crate::sql::query::Query;
use crate::sql::rows::{execute, fetch_one};
use crate::sql::tx::SqlTx;
use crate::sql::BACKEND;
use crate::types::Capabilities;

/// A [`SqlCollection`] bound to one open [`SqlTx`].
pub struct SqlReadWrite<'t, M: Model> {
    handle: SqlCollection<M>,
    tx: &'t SqlTx,
}

impl<'t, M: Model> SqlReadWrite<'t, M> {
    pub(crate) fn new(handle: SqlCollection<M>, tx: &'t SqlTx) -> Self {
        Self { handle, tx }
    }

    fn pk_column(&self) -> &str {
        &self.handle.schema.primary_key().storage_name
    }

    fn fetch(&self, key: &str, filtered: bool) -> CollResult<M::Message> {
        let schema = &self.handle.schema;
        let mut query = Query::select(schema);
        if filtered {
            query = query.filtered(&self.handle.filters.resolve(schema)?);
        }
        let query = query.and_equals(self.pk_column(), Value::from(key));
        let row = fetch_one(self.tx.conn(), schema, &query, key)?;
        row_to_message::<M>(&row)
    }

    fn insert(&self, key: &str, message: &M::Message, replace: bool) -> CollResult<()> {
        let schema = &self.handle.schema;
        let row = message_to_row::<M>(schema, key, message)?;
        let now = Value::Timestamp(self.handle.store.now());
        let query = if replace {
            Query::upsert(schema, &row, now)
        } else {
            Query::insert(schema, &row, now)
        };
        execute(self.tx.conn(), schema, &query, key)?;
        Ok(())
    }
}

impl<M: Model> ReadWriteCollection<M> for SqlReadWrite<'_, M> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn get(&self, key: &str) -> CollResult<M::Message> {
        self.fetch(key, true)
    }

    fn create(&self, key: &str, message: &M::Message) -> CollResult<()> {
        self.insert(key, message, false)
    }

    fn put(&self, key: &str, message: &M::Message) -> CollResult<()> {
        self.insert(key, message, true)
    }

    fn update<F>(&self, key: &str, mutate: F) -> CollResult<M::Message>
    where
        F: FnOnce(M::Message) -> CollResult<M::Message>,
    {
        let current = self.fetch(key, false)?;
        let updated = mutate(current)?;

        let schema = &self.handle.schema;
        let row = message_to_row::<M>(schema, key, &updated)?;
        let now = Value::Timestamp(self.handle.store.now());
        let query = Query::update(schema, &row, now).and_equals(self.pk_column(), Value::from(key));
        if execute(self.tx.conn(), schema, &query, key)? == 0 {
            return Err(CollError::not_found(schema.table(), key));
        }
        Ok(updated)
    }

    fn upsert<F>(&self, key: &str, initial: M::Message, mutate: F) -> CollResult<M::Message>
    where
        F: FnOnce(M::Message) -> CollResult<M::Message>,
    {
        let base = match self.fetch(key, false) {
            Ok(current) => current,
            Err(err) if err.is_not_found() => initial,
            Err(err) => return Err(err),
        };
        let updated = mutate(base)?;
        self.put(key, &updated)?;
        Ok(updated)
    }

    fn delete(&self, key: &str) -> CollResult<()> {
        let schema = &self.handle.schema;
        let query = Query::delete(schema).and_equals(self.pk_column(), Value::from(key));
        match execute(self.tx.conn(), schema, &query, key)? {
            0 => Err(CollError::not_found(schema.table(), key)),
            _ => Ok(()),
        }
    }

    fn delete_all(&self) -> CollResult<()> {
        let schema = &self.handle.schema;
        execute(self.tx.conn(), schema, &Query::delete(schema), "")?;
        Ok(())
    }

    fn claim<F>(&self, _key: &str, _message: &M::Message, _f: F) -> CollResult<()>
    where
        F: FnOnce(&ReadContext) -> CollResult<()>,
    {
        Err(CollError::unsupported("claim", BACKEND))
    }
}
