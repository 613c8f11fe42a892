//! Schema deriver: model field declarations to [`SchemaInfo`].

use std::collections::HashSet;

use tracing::debug;

use crate::error::{CollError, CollResult};
use crate::model::Model;
use crate::schema::info::{Index, SchemaInfo, SqlField, StorageType};

/// Bookkeeping columns every provisioned table carries.
pub const RESERVED_COLUMNS: [&str; 2] = ["createdat", "updatedat"];

/// Maps a declared Rust type to its storage type.
///
/// The table is closed: any type not listed is a configuration error.
pub fn storage_type_for(rust_type: &str) -> CollResult<StorageType> {
    let normalized: String = rust_type.chars().filter(|c| !c.is_whitespace()).collect();
    let storage = match normalized.as_str() {
        "String" | "std::string::String" | "&str" | "&'staticstr" => StorageType::Varchar,
        "DateTime<Utc>" | "chrono::DateTime<chrono::Utc>" | "Timestamp" => StorageType::Timestamp,
        "bool" => StorageType::Bool,
        "i64" => StorageType::BigInt,
        _ => {
            return Err(CollError::configuration(format!(
                "no storage type for {rust_type}"
            )))
        }
    };
    Ok(storage)
}

/// Derives the schema of `M`.
///
/// Fails when a field has an unmapped type, when two fields share a column
/// name or use a reserved column, or when the number of primary-key fields
/// is not exactly one.
pub fn derive_schema<M: Model>() -> CollResult<SchemaInfo> {
    let table = M::table_name().to_lowercase();
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CollError::configuration(format!(
            "invalid table name {:?}",
            M::table_name()
        )));
    }

    let mut fields = Vec::new();
    let mut primary_keys = Vec::new();
    let mut indexed = Vec::new();
    let mut columns = HashSet::new();

    for spec in M::fields() {
        let storage_type = storage_type_for(spec.rust_type)?;
        let storage_name = spec.name.to_lowercase();
        if RESERVED_COLUMNS.contains(&storage_name.as_str()) {
            return Err(CollError::configuration(format!(
                "{table}: column {storage_name} is reserved"
            )));
        }
        if !columns.insert(storage_name.clone()) {
            return Err(CollError::configuration(format!(
                "{table}: duplicate column {storage_name}"
            )));
        }
        if spec.primary_key {
            primary_keys.push(fields.len());
        } else if spec.indexed {
            indexed.push(fields.len());
        }
        fields.push(SqlField {
            storage_name,
            storage_type,
            name: spec.name,
            rust_type: spec.rust_type,
        });
    }

    let primary_key = match primary_keys.as_slice() {
        [] => {
            return Err(CollError::configuration(format!(
                "{table} has no field marked primary_key"
            )))
        }
        [single] => *single,
        many => {
            let names: Vec<_> = many.iter().map(|&i| fields[i].name).collect();
            return Err(CollError::configuration(format!(
                "{table} has multiple fields marked primary_key: {}",
                names.join(", ")
            )));
        }
    };
    if fields[primary_key].storage_type != StorageType::Varchar {
        return Err(CollError::configuration(format!(
            "{table}: primary key {} must be a string field",
            fields[primary_key].name
        )));
    }

    let indexes = indexed
        .into_iter()
        .map(|i| Index {
            name: format!("{table}_{}_idx", fields[i].storage_name),
            field: fields[i].name,
            column: fields[i].storage_name.clone(),
        })
        .collect();

    debug!(table = %table, fields = fields.len(), "derived schema");
    Ok(SchemaInfo {
        table,
        primary_key,
        fields,
        indexes,
    })
}
