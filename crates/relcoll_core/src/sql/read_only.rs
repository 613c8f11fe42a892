//! Read-only SQLite view.

use std::time::Instant;

use relcoll_codec::{Row, Value};
use rusqlite::Connection;
use tracing::debug;

use crate::collection::{row_to_message, CollectionHandle, ReadOnlyCollection};
use crate::context::ReadContext;
use crate::error::{CollError, CollResult};
use crate::model::Model;
use crate::schema::Index;
use crate::sql::collection::SqlCollection;
use crate::sql::error_map::map_sql_error;
use crate::sql::query::Query;
use crate::sql::rows::{fetch_one, read_row};
use crate::sql::BACKEND;
use crate::types::{Capabilities, ListOptions};
use crate::watch::{WatchOptions, Watcher};

/// Virtual machine steps between deadline checks of a running statement.
const DEADLINE_CHECK_OPS: i32 = 1000;

/// A [`SqlCollection`] bound to a [`ReadContext`].
///
/// Each operation borrows a pooled connection for its duration. While a
/// statement runs, cancelling the context interrupts it, and so does reaching
/// the context deadline.
#[derive(Debug, Clone)]
pub struct SqlReadOnly<M: Model> {
    handle: SqlCollection<M>,
    ctx: ReadContext,
}

impl<M: Model> SqlReadOnly<M> {
    pub(crate) fn new(handle: SqlCollection<M>, ctx: ReadContext) -> Self {
        Self { handle, ctx }
    }

    fn table(&self) -> &str {
        self.handle.schema.table()
    }

    fn with_connection<T>(&self, op: impl FnOnce(&Connection) -> CollResult<T>) -> CollResult<T> {
        self.ctx.check()?;
        let conn = self.handle.store.connection()?;
        let interrupt = conn.get_interrupt_handle();
        let _armed = self.ctx.on_cancel(move || interrupt.interrupt());
        let deadline = self.ctx.deadline();
        if let Some(deadline) = deadline {
            conn.progress_handler(
                DEADLINE_CHECK_OPS,
                Some(move || Instant::now() >= deadline),
            );
        }
        let result = op(&conn);
        if deadline.is_some() {
            conn.progress_handler(0, None::<fn() -> bool>);
        }
        // An interrupt caused by the deadline surfaces as `DeadlineExceeded`.
        result.map_err(|err| match err {
            CollError::Cancelled => self.ctx.check().err().unwrap_or(CollError::Cancelled),
            other => other,
        })
    }

    fn base_select(&self) -> CollResult<Query> {
        let filters = self.handle.filters.resolve(&self.handle.schema)?;
        Ok(Query::select(&self.handle.schema).filtered(&filters))
    }

    /// Reads every row `query` selects.
    ///
    /// The statement is finalized and the connection returned before any row
    /// reaches a callback, so callbacks may open write transactions.
    fn collect(&self, query: &Query) -> CollResult<Vec<Row>> {
        let schema = &self.handle.schema;
        debug!(table = schema.table(), sql = query.sql(), "scan");
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(query.sql())
                .map_err(|err| map_sql_error(err, schema.table(), ""))?;
            let mut rows = stmt
                .query(query.bound())
                .map_err(|err| map_sql_error(err, schema.table(), ""))?;
            let mut found = Vec::new();
            while let Some(result) = rows
                .next()
                .map_err(|err| map_sql_error(err, schema.table(), ""))?
            {
                self.ctx.check()?;
                found.push(read_row(schema, result)?);
            }
            Ok(found)
        })
    }

    fn scan<F>(&self, query: Query, mut f: F) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>,
    {
        for row in self.collect(&query)? {
            self.ctx.check()?;
            f(row_to_message::<M>(&row)?)?;
        }
        Ok(())
    }

    fn unsupported(operation: &'static str) -> CollError {
        CollError::unsupported(operation, BACKEND)
    }
}

impl<M: Model> ReadOnlyCollection<M> for SqlReadOnly<M> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn get(&self, key: &str) -> CollResult<M::Message> {
        let pk = &self.handle.schema.primary_key().storage_name;
        let query = self.base_select()?.and_equals(pk, Value::from(key));
        let row =
            self.with_connection(|conn| fetch_one(conn, &self.handle.schema, &query, key))?;
        row_to_message::<M>(&row)
    }

    fn get_by_index(&self, index: &Index, value: impl Into<Value>) -> CollResult<M::Message> {
        let value = value.into();
        let narrowed = self.handle.with(index.field, value.clone());
        let filters = narrowed.filters.resolve(&narrowed.schema)?;
        let query = Query::select(&narrowed.schema).filtered(&filters).limit(1);
        let key = format!("{}={value}", index.field);
        let row =
            self.with_connection(|conn| fetch_one(conn, &self.handle.schema, &query, &key))?;
        row_to_message::<M>(&row)
    }

    fn list_by_index<F>(
        &self,
        index: &Index,
        value: impl Into<Value>,
        opts: &ListOptions,
        f: F,
    ) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>,
    {
        self.handle
            .with(index.field, value)
            .read_only(&self.ctx)
            .list(opts, f)
    }

    fn list<F>(&self, opts: &ListOptions, f: F) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>,
    {
        let query = self.base_select()?.order_by(opts.ordering()?);
        self.scan(query, f)
    }

    fn list_prefix<F>(&self, prefix: &str, opts: &ListOptions, f: F) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>,
    {
        let pk = &self.handle.schema.primary_key().storage_name;
        let query = self
            .base_select()?
            .and_prefix(pk, prefix)
            .order_by(opts.ordering()?);
        self.scan(query, f)
    }

    fn count(&self) -> CollResult<i64> {
        let filters = self.handle.filters.resolve(&self.handle.schema)?;
        let query = Query::count(&self.handle.schema).filtered(&filters);
        self.with_connection(|conn| {
            conn.query_row(query.sql(), query.bound(), |r| r.get(0))
                .map_err(|err| map_sql_error(err, self.table(), ""))
        })
    }

    fn watch(&self, _opts: &WatchOptions) -> CollResult<Watcher<M>> {
        Err(Self::unsupported("watch"))
    }

    fn watch_one(&self, _key: &str, _opts: &WatchOptions) -> CollResult<Watcher<M>> {
        Err(Self::unsupported("watch_one"))
    }

    fn watch_by_index(
        &self,
        _index: &Index,
        _value: impl Into<Value>,
        _opts: &WatchOptions,
    ) -> CollResult<Watcher<M>> {
        Err(Self::unsupported("watch_by_index"))
    }
}
