//! Sample models.

use relcoll_core::{fields, CollResult, FieldSpec, Model, Row};
use serde::{Deserialize, Serialize};

/// A file entry keyed by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path, the primary key.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// Owning user. Indexed.
    pub owner: String,
    /// Whether the file is archived.
    pub archived: bool,
}

impl FileRecord {
    /// A live file owned by `owner`.
    pub fn new(name: impl Into<String>, size: i64, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            owner: owner.into(),
            archived: false,
        }
    }
}

impl Model for FileRecord {
    type Message = Self;

    fn table_name() -> &'static str {
        "FileRecords"
    }

    fn fields() -> Vec<FieldSpec> {
        fields![
            Name: String => primary_key,
            Size: i64,
            Owner: String => indexed,
            Archived: bool,
        ]
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("Name", &self.name)
            .with("Size", self.size)
            .with("Owner", &self.owner)
            .with("Archived", self.archived)
    }

    fn from_row(row: &Row) -> CollResult<Self> {
        Ok(Self {
            name: row.text("Name")?,
            size: row.integer("Size")?,
            owner: row.text("Owner")?,
            archived: row.boolean("Archived")?,
        })
    }

    fn write_message(&self) -> CollResult<Self> {
        Ok(self.clone())
    }

    fn load_message(message: &Self) -> CollResult<Self> {
        Ok(message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relcoll_core::derive_schema;

    #[test]
    fn schema_derives() {
        let schema = derive_schema::<FileRecord>().unwrap();
        assert_eq!(schema.table(), "filerecords");
        assert_eq!(schema.primary_key().storage_name, "name");
        assert_eq!(schema.indexes().len(), 1);
    }

    #[test]
    fn row_roundtrip() {
        let file = FileRecord::new("a/b", 7, "ann");
        assert_eq!(FileRecord::from_row(&file.to_row()).unwrap(), file);
    }
}
