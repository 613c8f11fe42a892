//! Idempotent table provisioning.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{CollError, CollResult};
use crate::schema::SchemaInfo;
use crate::sql::query::{CREATED_COLUMN, UPDATED_COLUMN};

/// DDL creating the table and its indexes if they do not exist.
pub fn provision_statements(schema: &SchemaInfo) -> Vec<String> {
    let mut columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| format!("{} {}", f.storage_name, f.storage_type))
        .collect();
    columns.push(format!("{CREATED_COLUMN} timestamp not null"));
    columns.push(format!("{UPDATED_COLUMN} timestamp not null"));
    columns.push(format!("primary key({})", schema.primary_key().storage_name));

    let mut statements = vec![format!(
        "create table if not exists {} ({})",
        schema.table(),
        columns.join(", ")
    )];
    statements.extend(schema.indexes().iter().map(|index| {
        format!(
            "create index if not exists {} on {} ({})",
            index.name,
            schema.table(),
            index.column
        )
    }));
    statements
}

/// Ensures the table for `schema` exists.
pub(crate) fn provision(conn: &Connection, schema: &SchemaInfo) -> CollResult<()> {
    for statement in provision_statements(schema) {
        debug!(sql = %statement, "provisioning");
        conn.execute_batch(&statement)
            .map_err(|err| CollError::store(format!("provision {}", schema.table()), err))?;
    }
    info!(table = schema.table(), "table provisioned");
    Ok(())
}
