//! In-memory collection handle.

use std::marker::PhantomData;
use std::sync::Arc;

use relcoll_codec::Value;

use crate::collection::{CollectionHandle, Filters};
use crate::context::ReadContext;
use crate::error::CollResult;
use crate::memory::read_only::MemoryReadOnly;
use crate::memory::read_write::MemoryReadWrite;
use crate::memory::store::MemoryStore;
use crate::memory::tx::MemoryTx;
use crate::model::Model;
use crate::schema::{derive_schema, SchemaInfo};
use crate::types::Capabilities;

/// A model bound to a [`MemoryStore`] table.
pub struct MemoryCollection<M: Model> {
    pub(crate) store: MemoryStore,
    pub(crate) schema: Arc<SchemaInfo>,
    pub(crate) filters: Filters,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for MemoryCollection<M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            schema: Arc::clone(&self.schema),
            filters: self.filters.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for MemoryCollection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("table", &self.schema.table())
            .field("filters", &self.filters)
            .finish()
    }
}

impl<M: Model> MemoryCollection<M> {
    /// Derives the schema of `M` and registers its table in `store`.
    pub fn new(store: &MemoryStore) -> CollResult<Self> {
        let schema = derive_schema::<M>()?;
        store.register_table(schema.table());
        Ok(Self {
            store: store.clone(),
            schema: Arc::new(schema),
            filters: Filters::new(),
            _model: PhantomData,
        })
    }

    /// The store this handle writes to.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl<M: Model> CollectionHandle<M> for MemoryCollection<M> {
    type Runner = MemoryStore;
    type ReadOnly = MemoryReadOnly<M>;
    type ReadWrite<'t> = MemoryReadWrite<'t, M>;

    fn schema(&self) -> &SchemaInfo {
        &self.schema
    }

    fn runner(&self) -> &MemoryStore {
        &self.store
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
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

    fn read_only(&self, ctx: &ReadContext) -> MemoryReadOnly<M> {
        MemoryReadOnly::new(self.clone(), ctx.clone())
    }

    fn read_write<'t>(&self, tx: &'t MemoryTx) -> MemoryReadWrite<'t, M> {
        MemoryReadWrite::new(self.clone(), tx)
    }
}
