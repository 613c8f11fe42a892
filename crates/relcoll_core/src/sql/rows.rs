//! Reading result rows back into [`Row`]s.

use relcoll_codec::{parse_timestamp, Row, Value};
use rusqlite::Connection;

use crate::error::CollResult;
use crate::schema::{SchemaInfo, StorageType};
use crate::sql::error_map::map_sql_error;
use crate::sql::query::Query;

/// Reads a row selected by [`Query::select`], keyed by in-memory field name.
pub(crate) fn read_row(schema: &SchemaInfo, result: &rusqlite::Row<'_>) -> CollResult<Row> {
    let mut row = Row::with_capacity(schema.fields().len());
    for (idx, field) in schema.fields().iter().enumerate() {
        let get_err = |err| map_sql_error(err, schema.table(), "");
        let value = match field.storage_type {
            StorageType::Varchar => result
                .get::<_, Option<String>>(idx)
                .map_err(get_err)?
                .map_or(Value::Null, Value::Text),
            StorageType::BigInt => result
                .get::<_, Option<i64>>(idx)
                .map_err(get_err)?
                .map_or(Value::Null, Value::Integer),
            StorageType::Bool => result
                .get::<_, Option<bool>>(idx)
                .map_err(get_err)?
                .map_or(Value::Null, Value::Bool),
            StorageType::Timestamp => match result
                .get::<_, Option<String>>(idx)
                .map_err(get_err)?
            {
                Some(text) => Value::Timestamp(parse_timestamp(&text)?),
                None => Value::Null,
            },
        };
        row.set(field.name, value);
    }
    Ok(row)
}

/// Runs a single-row select, reporting an empty result as `NotFound(key)`.
pub(crate) fn fetch_one(
    conn: &Connection,
    schema: &SchemaInfo,
    query: &Query,
    key: &str,
) -> CollResult<Row> {
    conn.query_row(query.sql(), query.bound(), |result| Ok(read_row(schema, result)))
        .map_err(|err| map_sql_error(err, schema.table(), key))?
}

/// Runs a statement, returning the number of affected rows.
pub(crate) fn execute(
    conn: &Connection,
    schema: &SchemaInfo,
    query: &Query,
    key: &str,
) -> CollResult<usize> {
    tracing::debug!(table = schema.table(), sql = query.sql(), "execute");
    conn.execute(query.sql(), query.bound())
        .map_err(|err| map_sql_error(err, schema.table(), key))
}
