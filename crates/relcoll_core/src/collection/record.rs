//! Conversions between wire messages and schema-shaped rows.

use relcoll_codec::{Row, Value};

use crate::error::{CollError, CollResult};
use crate::model::Model;
use crate::schema::SchemaInfo;

/// Converts `message` into a row holding exactly the schema's fields, in
/// schema order.
///
/// Fails if a field holds a value of the wrong type, or if the record's
/// primary key differs from `key`.
pub(crate) fn message_to_row<M: Model>(
    schema: &SchemaInfo,
    key: &str,
    message: &M::Message,
) -> CollResult<Row> {
    let source = M::load_message(message)?.to_row();
    let mut row = Row::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let value = source.get(field.name).cloned().unwrap_or(Value::Null);
        if !field.storage_type.accepts(&value) {
            return Err(CollError::invalid_operation(format!(
                "{}.{} is {} but the record holds a {} value",
                schema.table(),
                field.name,
                field.storage_type,
                value.type_name()
            )));
        }
        row.set(field.name, value);
    }

    let pk = schema.primary_key();
    match row.get(pk.name) {
        Some(Value::Text(stored)) if stored == key => Ok(row),
        other => Err(CollError::invalid_operation(format!(
            "{}: record key {} does not match {key:?}",
            schema.table(),
            other.map_or_else(|| "<missing>".to_string(), |v| format!("{v:?}"))
        ))),
    }
}

/// Rebuilds the wire message from a stored row.
pub(crate) fn row_to_message<M: Model>(row: &Row) -> CollResult<M::Message> {
    M::from_row(row)?.write_message()
}
