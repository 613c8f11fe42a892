//! Typed statement builder.
//!
//! Every value is bound as a numbered parameter. Placeholders are numbered
//! as values are appended, so column and parameter order cannot drift.
//! Identifiers only ever come from a derived [`SchemaInfo`].

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::ParamsFromIter;

use relcoll_codec::{format_timestamp, Row, Value};

use crate::schema::{SchemaInfo, SqlField};
use crate::types::RowOrder;

/// Bookkeeping column set on insert.
pub(crate) const CREATED_COLUMN: &str = "createdat";
/// Bookkeeping column set on every write.
pub(crate) const UPDATED_COLUMN: &str = "updatedat";

/// A statement plus its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Query {
    sql: String,
    params: Vec<Value>,
    has_where: bool,
}

impl Query {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
            has_where: false,
        }
    }

    /// `select <fields> from <table>`
    pub fn select(schema: &SchemaInfo) -> Self {
        let columns: Vec<&str> = schema
            .fields()
            .iter()
            .map(|f| f.storage_name.as_str())
            .collect();
        Self::new(format!(
            "select {} from {}",
            columns.join(", "),
            schema.table()
        ))
    }

    /// `select count(*) from <table>`
    pub fn count(schema: &SchemaInfo) -> Self {
        Self::new(format!("select count(*) from {}", schema.table()))
    }

    /// `delete from <table>`
    pub fn delete(schema: &SchemaInfo) -> Self {
        Self::new(format!("delete from {}", schema.table()))
    }

    /// Strict insert of `row`, stamping both bookkeeping columns with `now`.
    pub fn insert(schema: &SchemaInfo, row: &Row, now: Value) -> Self {
        let mut query = Self::new(String::new());
        let mut columns = Vec::with_capacity(schema.fields().len() + 2);
        let mut placeholders = Vec::with_capacity(columns.capacity());
        for field in schema.fields() {
            columns.push(field.storage_name.as_str());
            placeholders.push(query.bind(column_value(row, field)));
        }
        let stamp = query.bind(now);
        columns.extend([CREATED_COLUMN, UPDATED_COLUMN]);
        placeholders.extend([stamp.clone(), stamp]);
        query.sql = format!(
            "insert into {} ({}) values ({})",
            schema.table(),
            columns.join(", "),
            placeholders.join(", ")
        );
        query
    }

    /// Insert that replaces every field on primary-key conflict.
    ///
    /// `createdat` keeps its original value.
    pub fn upsert(schema: &SchemaInfo, row: &Row, now: Value) -> Self {
        let mut query = Self::insert(schema, row, now);
        let assignments: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| f.storage_name.as_str())
            .chain([UPDATED_COLUMN])
            .map(|column| format!("{column} = excluded.{column}"))
            .collect();
        query.sql.push_str(&format!(
            " on conflict ({}) do update set {}",
            schema.primary_key().storage_name,
            assignments.join(", ")
        ));
        query
    }

    /// `update <table> set <every field>, updatedat = now`
    ///
    /// Callers narrow it with [`Query::and_equals`] on the primary key.
    pub fn update(schema: &SchemaInfo, row: &Row, now: Value) -> Self {
        let mut query = Self::new(String::new());
        let mut assignments = Vec::with_capacity(schema.fields().len() + 1);
        for field in schema.fields() {
            let placeholder = query.bind(column_value(row, field));
            assignments.push(format!("{} = {placeholder}", field.storage_name));
        }
        let stamp = query.bind(now);
        assignments.push(format!("{UPDATED_COLUMN} = {stamp}"));
        query.sql = format!("update {} set {}", schema.table(), assignments.join(", "));
        query
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    fn condition(&mut self, clause: &str) {
        self.sql
            .push_str(if self.has_where { " and " } else { " where " });
        self.sql.push_str(clause);
        self.has_where = true;
    }

    /// Adds `column = ?`.
    #[must_use]
    pub fn and_equals(mut self, column: &str, value: Value) -> Self {
        let placeholder = self.bind(value);
        self.condition(&format!("{column} = {placeholder}"));
        self
    }

    /// Adds one equality condition per resolved filter.
    #[must_use]
    pub fn filtered(self, filters: &[(&SqlField, &Value)]) -> Self {
        filters.iter().fold(self, |query, (field, value)| {
            query.and_equals(&field.storage_name, (*value).clone())
        })
    }

    /// Adds a literal prefix match on `column`.
    #[must_use]
    pub fn and_prefix(mut self, column: &str, prefix: &str) -> Self {
        let placeholder = self.bind(Value::Text(like_prefix_pattern(prefix)));
        self.condition(&format!("{column} like {placeholder} escape '\\'"));
        self
    }

    /// Appends an order-by clause on a bookkeeping column.
    #[must_use]
    pub fn order_by(mut self, order: Option<RowOrder>) -> Self {
        if let Some(order) = order {
            let column = match order {
                RowOrder::Created { .. } => CREATED_COLUMN,
                RowOrder::Modified { .. } => UPDATED_COLUMN,
            };
            let direction = if order.is_descending() { "desc" } else { "asc" };
            self.sql
                .push_str(&format!(" order by {column} {direction}"));
        }
        self
    }

    /// Appends `limit n`.
    #[must_use]
    pub fn limit(mut self, n: u32) -> Self {
        self.sql.push_str(&format!(" limit {n}"));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[cfg(test)]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameters in the form rusqlite binds.
    pub fn bound(&self) -> ParamsFromIter<impl Iterator<Item = SqlValue<'_>>> {
        rusqlite::params_from_iter(self.params.iter().map(SqlValue))
    }
}

fn column_value(row: &Row, field: &SqlField) -> Value {
    row.get(field.name).cloned().unwrap_or(Value::Null)
}

/// Builds a `like` pattern matching strings that start with `prefix`.
pub(crate) fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Binds a column value. Timestamps are stored as fixed-width text.
pub(crate) struct SqlValue<'a>(&'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqliteValue::Integer(i64::from(*b))),
            Value::Integer(n) => ToSqlOutput::Owned(SqliteValue::Integer(*n)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Timestamp(t) => ToSqlOutput::Owned(SqliteValue::Text(format_timestamp(t))),
        })
    }
}
