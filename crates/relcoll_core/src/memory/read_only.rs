//! Read-only in-memory view and watches.

use std::ops::Bound;

use relcoll_codec::{decode_row, Row, Value};

use crate::collection::{row_to_message, CollectionHandle, Filters, ReadOnlyCollection};
use crate::context::ReadContext;
use crate::error::{CollError, CollResult};
use crate::memory::change_feed::EventFilter;
use crate::memory::collection::MemoryCollection;
use crate::memory::store::Table;
use crate::model::Model;
use crate::schema::{Index, SchemaInfo};
use crate::types::{Capabilities, ListOptions, RowOrder};
use crate::watch::{ChangeEvent, WatchOptions, Watcher};

/// Which keys a scan or watch covers.
#[derive(Debug, Clone)]
enum KeyRange {
    All,
    Exact(String),
    Prefix(String),
}

impl KeyRange {
    fn contains(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(k) => k == key,
            Self::Prefix(p) => key.starts_with(p.as_str()),
        }
    }

    fn rows<'a>(&'a self, table: &'a Table) -> Box<dyn Iterator<Item = (&'a String, &'a crate::memory::store::StoredRow)> + 'a> {
        match self {
            Self::All => Box::new(table.iter()),
            Self::Exact(k) => Box::new(table.get_key_value(k.as_str()).into_iter()),
            Self::Prefix(p) => Box::new(
                table
                    .range::<str, _>((Bound::Included(p.as_str()), Bound::Unbounded))
                    .take_while(move |(k, _)| k.starts_with(p.as_str())),
            ),
        }
    }
}

/// Filters resolved to owned `(field name, value)` pairs.
#[derive(Debug, Clone)]
struct RowMatcher {
    constraints: Vec<(&'static str, Value)>,
}

impl RowMatcher {
    fn new(filters: &Filters, schema: &SchemaInfo) -> CollResult<Self> {
        let constraints = filters
            .resolve(schema)?
            .into_iter()
            .map(|(field, value)| (field.name, value.clone()))
            .collect();
        Ok(Self { constraints })
    }

    fn matches(&self, row: &Row) -> bool {
        self.constraints
            .iter()
            .all(|(name, value)| row.get(name).unwrap_or(&Value::Null) == value)
    }

    fn matches_bytes(&self, bytes: Option<&[u8]>) -> bool {
        match bytes {
            _ if self.constraints.is_empty() => true,
            Some(bytes) => decode_row(bytes).is_ok_and(|row| self.matches(&row)),
            None => false,
        }
    }
}

/// A [`MemoryCollection`] bound to a [`ReadContext`].
///
/// Reads see committed state only. Listing copies the matching rows out
/// under the store's read lock and invokes the callback after releasing it.
#[derive(Debug, Clone)]
pub struct MemoryReadOnly<M: Model> {
    handle: MemoryCollection<M>,
    ctx: ReadContext,
}

impl<M: Model> MemoryReadOnly<M> {
    pub(crate) fn new(handle: MemoryCollection<M>, ctx: ReadContext) -> Self {
        Self { handle, ctx }
    }

    fn table(&self) -> &str {
        self.handle.schema.table()
    }

    fn collect(&self, range: &KeyRange, order: Option<RowOrder>) -> CollResult<Vec<Row>> {
        self.ctx.check()?;
        let matcher = RowMatcher::new(&self.handle.filters, &self.handle.schema)?;
        let mut found = Vec::new();
        {
            let state = self.handle.store.read_state();
            if let Some(table) = state.tables.get(self.table()) {
                for (_, stored) in range.rows(table) {
                    let row = decode_row(&stored.bytes)?;
                    if matcher.matches(&row) {
                        found.push((stored.create_revision, stored.mod_revision, row));
                    }
                }
            }
        }
        match order {
            None => {}
            Some(RowOrder::Created { descending }) => {
                found.sort_by_key(|(created, _, _)| *created);
                if descending {
                    found.reverse();
                }
            }
            Some(RowOrder::Modified { descending }) => {
                found.sort_by_key(|(_, modified, _)| *modified);
                if descending {
                    found.reverse();
                }
            }
        }
        Ok(found.into_iter().map(|(_, _, row)| row).collect())
    }

    fn stream<F>(&self, rows: Vec<Row>, mut f: F) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>,
    {
        for row in rows {
            self.ctx.check()?;
            f(row_to_message::<M>(&row)?)?;
        }
        Ok(())
    }

    fn subscribe(&self, range: KeyRange, opts: &WatchOptions) -> CollResult<Watcher<M>> {
        if opts.include_initial && opts.since_revision.is_some() {
            return Err(CollError::configuration(
                "include_initial and since_revision cannot be combined",
            ));
        }
        let range = match (range, &opts.prefix) {
            (KeyRange::All, Some(prefix)) => KeyRange::Prefix(prefix.clone()),
            (range, _) => range,
        };
        let matcher = RowMatcher::new(&self.handle.filters, &self.handle.schema)?;
        let table = self.table().to_string();

        let state = self.handle.store.read_state();
        let mut initial = Vec::new();
        if opts.include_initial {
            if let Some(rows) = state.tables.get(&table) {
                for (key, stored) in range.rows(rows) {
                    if matcher.matches_bytes(Some(&stored.bytes)) {
                        initial.push(ChangeEvent::put(
                            stored.mod_revision,
                            table.as_str(),
                            key.as_str(),
                            stored.bytes.clone(),
                            None,
                        ));
                    }
                }
            }
        }

        let filter: EventFilter = Box::new(move |event: &ChangeEvent| {
            event.table == table && range.contains(&event.key) && matcher.matches_bytes(event.subject())
        });
        let receiver = self
            .handle
            .store
            .change_feed()
            .subscribe(filter, initial, opts.since_revision)?;
        drop(state);
        Ok(Watcher::new(receiver))
    }
}

impl<M: Model> ReadOnlyCollection<M> for MemoryReadOnly<M> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn get(&self, key: &str) -> CollResult<M::Message> {
        self.collect(&KeyRange::Exact(key.to_string()), None)?
            .first()
            .ok_or_else(|| CollError::not_found(self.table(), key))
            .and_then(row_to_message::<M>)
    }

    fn get_by_index(&self, index: &Index, value: impl Into<Value>) -> CollResult<M::Message> {
        let value = value.into();
        let key = format!("{}={value}", index.field);
        self.handle
            .with(index.field, value)
            .read_only(&self.ctx)
            .collect(&KeyRange::All, None)?
            .first()
            .ok_or_else(|| CollError::not_found(self.table(), key))
            .and_then(row_to_message::<M>)
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
        let rows = self.collect(&KeyRange::All, opts.ordering()?)?;
        self.stream(rows, f)
    }

    fn list_prefix<F>(&self, prefix: &str, opts: &ListOptions, f: F) -> CollResult<()>
    where
        F: FnMut(M::Message) -> CollResult<()>,
    {
        let rows = self.collect(&KeyRange::Prefix(prefix.to_string()), opts.ordering()?)?;
        self.stream(rows, f)
    }

    fn count(&self) -> CollResult<i64> {
        let rows = self.collect(&KeyRange::All, None)?;
        i64::try_from(rows.len()).map_err(|_| CollError::invalid_operation("row count overflow"))
    }

    fn watch(&self, opts: &WatchOptions) -> CollResult<Watcher<M>> {
        self.subscribe(KeyRange::All, opts)
    }

    fn watch_one(&self, key: &str, opts: &WatchOptions) -> CollResult<Watcher<M>> {
        self.subscribe(KeyRange::Exact(key.to_string()), opts)
    }

    fn watch_by_index(
        &self,
        index: &Index,
        value: impl Into<Value>,
        opts: &WatchOptions,
    ) -> CollResult<Watcher<M>> {
        self.handle
            .with(index.field, value)
            .read_only(&self.ctx)
            .subscribe(KeyRange::All, opts)
    }
}
