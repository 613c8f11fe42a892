//! SQLite collection handle.

use std::marker::PhantomData;
use std::sync::Arc;

use relcoll_codec::Value;
use tracing::warn;

use crate::collection::{CollectionHandle, Filters};
use crate::context::ReadContext;
use crate::error::CollResult;
use crate::model::Model;
use crate::schema::{derive_schema, SchemaInfo};
use crate::sql::provision::provision;
use crate::sql::query::Query;
use crate::sql::read_only::SqlReadOnly;
use crate::sql::read_write::SqlReadWrite;
use crate::sql::rows::execute;
use crate::sql::store::SqlStore;
use crate::sql::tx::SqlTx;
use crate::types::Capabilities;

/// A model bound to a [`SqlStore`] table.
pub struct SqlCollection<M: Model> {
    pub(crate) store: SqlStore,
    pub(crate) schema: Arc<SchemaInfo>,
    pub(crate) filters: Filters,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for SqlCollection<M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            schema: Arc::clone(&self.schema),
            filters: self.filters.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for SqlCollection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlCollection")
            .field("table", &self.schema.table())
            .field("filters", &self.filters)
            .finish()
    }
}

impl<M: Model> SqlCollection<M> {
    /// Derives the schema of `M` and provisions its table in `store`.
    ///
    /// Both steps are fatal: an invalid model is a `Configuration` error and
    /// a failed DDL statement a `Store` error.
    pub fn new(store: &SqlStore) -> CollResult<Self> {
        let schema = derive_schema::<M>()?;
        let conn = store.connection()?;
        provision(&conn, &schema)?;
        Ok(Self {
            store: store.clone(),
            schema: Arc::new(schema),
            filters: Filters::new(),
            _model: PhantomData,
        })
    }

    /// The store this handle writes to.
    #[must_use]
    pub fn store(&self) -> &SqlStore {
        &self.store
    }

    /// Deletes every row of the table on its own autocommit connection.
    ///
    /// This bypasses transactional isolation: it neither joins nor waits for
    /// the caller's transaction, and cannot be rolled back. Prefer
    /// `delete_all` on a read-write view.
    pub fn purge_outside_transaction(&self) -> CollResult<usize> {
        let conn = self.store.connection()?;
        let removed = execute(&conn, &self.schema, &Query::delete(&self.schema), "")?;
        warn!(table = self.schema.table(), removed, "table purged outside a transaction");
        Ok(removed)
    }
}

impl<M: Model> CollectionHandle<M> for SqlCollection<M> {
    type Runner = SqlStore;
    type ReadOnly = SqlReadOnly<M>;
    type ReadWrite<'t> = SqlReadWrite<'t, M>;

    fn schema(&self) -> &SchemaInfo {
        &self.schema
    }

    fn runner(&self) -> &SqlStore {
        &self.store
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn filters(&self) -> &Filters {
        &self.filters
    }

    fn with(&self, field: &str, value: impl Into<Value>) -> Self {
        Self {
            filters: self.filters.and(field, value.into()),
            ..self.clone()
        }
    }

    fn read_only(&self, ctx: &ReadContext) -> SqlReadOnly<M> {
        SqlReadOnly::new(self.clone(), ctx.clone())
    }

    fn read_write<'t>(&self, tx: &'t SqlTx) -> SqlReadWrite<'t, M> {
        SqlReadWrite::new(self.clone(), tx)
    }
}
