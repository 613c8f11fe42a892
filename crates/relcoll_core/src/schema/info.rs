//! Derived schema description.

use std::fmt;

use relcoll_codec::Value;

use crate::error::{CollError, CollResult};

/// Storage column types the collection layer knows how to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Variable-length text.
    Varchar,
    /// Point in time.
    Timestamp,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    BigInt,
}

impl StorageType {
    /// The column type used in DDL.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Varchar => "varchar",
            Self::Timestamp => "timestamp",
            Self::Bool => "bool",
            Self::BigInt => "bigint",
        }
    }

    /// Whether `value` may be stored in a column of this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Varchar, Value::Text(_))
                | (Self::Timestamp, Value::Timestamp(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::BigInt, Value::Integer(_))
        )
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One column of a derived schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlField {
    /// Column name (lower-cased field name).
    pub storage_name: String,
    /// Column type.
    pub storage_type: StorageType,
    /// In-memory field name.
    pub name: &'static str,
    /// Declared Rust type.
    pub rust_type: &'static str,
}

/// A secondary index over one non-primary field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Index {
    /// Index name, `<table>_<column>_idx`.
    pub name: String,
    /// In-memory name of the indexed field.
    pub field: &'static str,
    /// Column of the indexed field.
    pub column: String,
}

/// Immutable description of a model's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    pub(crate) table: String,
    pub(crate) primary_key: usize,
    pub(crate) fields: Vec<SqlField>,
    pub(crate) indexes: Vec<Index>,
}

impl SchemaInfo {
    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The primary-key field.
    #[must_use]
    pub fn primary_key(&self) -> &SqlField {
        &self.fields[self.primary_key]
    }

    /// All fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[SqlField] {
        &self.fields
    }

    /// Secondary indexes.
    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Finds a field by in-memory or column name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SqlField> {
        self.fields
            .iter()
            .find(|f| f.name == name || f.storage_name.eq_ignore_ascii_case(name))
    }

    /// Like [`SchemaInfo::field`] but reports unknown names as configuration errors.
    pub fn require_field(&self, name: &str) -> CollResult<&SqlField> {
        self.field(name).ok_or_else(|| {
            CollError::configuration(format!("{} has no field named {name}", self.table))
        })
    }

    /// Returns the index declared on `field`.
    pub fn index(&self, field: &str) -> CollResult<Index> {
        let column = &self.require_field(field)?.storage_name;
        self.indexes
            .iter()
            .find(|idx| &idx.column == column)
            .cloned()
            .ok_or_else(|| {
                CollError::configuration(format!("{} has no index on {field}", self.table))
            })
    }
}
