//! Normalizes SQLite failures into [`CollError`].

use rusqlite::{ffi, ErrorCode};

use crate::error::CollError;

/// Maps a rusqlite error raised while operating on `key` in `table`.
///
/// - no rows: `NotFound`
/// - primary-key or unique violation: `AlreadyExists`
/// - interrupted statement: `Cancelled`
/// - anything else: `Store`, with the driver error as its source
pub(crate) fn map_sql_error(err: rusqlite::Error, table: &str, key: &str) -> CollError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => CollError::not_found(table, key),
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE) =>
        {
            CollError::already_exists(table, key)
        }
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::OperationInterrupted =>
        {
            CollError::Cancelled
        }
        other if key.is_empty() => CollError::store(table.to_string(), other),
        other => CollError::store(format!("{table}/{key}"), other),
    }
}
