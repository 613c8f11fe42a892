//! Equality filters added with `with`.

use relcoll_codec::{Row, Value};

use crate::error::{CollError, CollResult};
use crate::schema::{SchemaInfo, SqlField};

/// An ordered set of `field == value` constraints.
///
/// Field names are checked against the schema when the filters are used,
/// not when they are added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    entries: Vec<(String, Value)>,
}

impl Filters {
    /// No constraints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with one more constraint.
    #[must_use]
    pub fn and(&self, field: &str, value: Value) -> Self {
        let mut entries = self.entries.clone();
        entries.push((field.to_string(), value));
        Self { entries }
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves each constraint to its schema field.
    ///
    /// Unknown fields and values of the wrong type are configuration errors.
    pub fn resolve<'a>(
        &'a self,
        schema: &'a SchemaInfo,
    ) -> CollResult<Vec<(&'a SqlField, &'a Value)>> {
        self.entries
            .iter()
            .map(|(name, value)| {
                let field = schema.require_field(name)?;
                if !field.storage_type.accepts(value) {
                    return Err(CollError::configuration(format!(
                        "{}.{} is {} but was compared with a {} value",
                        schema.table(),
                        field.name,
                        field.storage_type,
                        value.type_name()
                    )));
                }
                Ok((field, value))
            })
            .collect()
    }

    /// Checks a row keyed by in-memory field names against the constraints.
    pub fn matches(&self, schema: &SchemaInfo, row: &Row) -> CollResult<bool> {
        Ok(self
            .resolve(schema)?
            .into_iter()
            .all(|(field, value)| row.get(field.name).unwrap_or(&Value::Null) == value))
    }
}
