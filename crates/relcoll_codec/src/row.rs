//! Ordered column maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// A record flattened into named column values.
///
/// Columns keep the order they were inserted in, which for rows produced by
/// a model is the model's declared field order. Setting an existing column
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty row with room for `capacity` columns.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Builder form of [`Row::set`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column, replacing any previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Returns the value of a column, if present.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates over `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns a copy with columns sorted by name.
    ///
    /// Two rows with the same columns produce identical canonical forms
    /// regardless of insertion order.
    #[must_use]
    pub fn canonical(&self) -> Self {
        let mut columns = self.columns.clone();
        columns.sort_by(|a, b| a.0.cmp(&b.0));
        Self { columns }
    }

    fn require(&self, column: &str) -> CodecResult<&Value> {
        self.get(column)
            .ok_or_else(|| CodecError::missing_column(column))
    }

    fn mismatch(column: &str, expected: &'static str, actual: &Value) -> CodecError {
        CodecError::TypeMismatch {
            column: column.to_string(),
            expected,
            actual: actual.type_name(),
        }
    }

    /// Reads a text column.
    pub fn text(&self, column: &str) -> CodecResult<String> {
        match self.require(column)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    /// Reads an integer column.
    pub fn integer(&self, column: &str) -> CodecResult<i64> {
        match self.require(column)? {
            Value::Integer(n) => Ok(*n),
            other => Err(Self::mismatch(column, "integer", other)),
        }
    }

    /// Reads a boolean column.
    pub fn boolean(&self, column: &str) -> CodecResult<bool> {
        match self.require(column)? {
            Value::Bool(b) => Ok(*b),
            other => Err(Self::mismatch(column, "bool", other)),
        }
    }

    /// Reads a timestamp column.
    pub fn timestamp(&self, column: &str) -> CodecResult<DateTime<Utc>> {
        match self.require(column)? {
            Value::Timestamp(t) => Ok(*t),
            other => Err(Self::mismatch(column, "timestamp", other)),
        }
    }

    /// Reads a nullable text column. Both a missing column and `NULL` yield `None`.
    pub fn optional_text(&self, column: &str) -> CodecResult<Option<String>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Self::mismatch(column, "text", other)),
        }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut row = Row::new().with("a", 1i64).with("b", "x");
        row.set("a", 2i64);
        assert_eq!(row.len(), 2);
        assert_eq!(row.integer("a").unwrap(), 2);
        let order: Vec<_> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn typed_reads_report_mismatch() {
        let row = Row::new().with("size", "ten");
        assert_eq!(
            row.integer("size"),
            Err(CodecError::TypeMismatch {
                column: "size".into(),
                expected: "integer",
                actual: "text",
            })
        );
        assert_eq!(
            row.text("missing"),
            Err(CodecError::missing_column("missing"))
        );
    }

    #[test]
    fn optional_text_accepts_null() {
        let row = Row::new().with("owner", Value::Null);
        assert_eq!(row.optional_text("owner").unwrap(), None);
        assert_eq!(row.optional_text("absent").unwrap(), None);
    }

    #[test]
    fn canonical_ignores_insertion_order() {
        let a = Row::new().with("x", 1i64).with("y", true);
        let b = Row::new().with("y", true).with("x", 1i64);
        assert_ne!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }
}
