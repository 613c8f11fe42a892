//! Models shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use relcoll_core::{fields, CollResult, FieldSpec, Model, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub name: String,
    pub size: i64,
}

impl File {
    pub fn new(name: &str, size: i64) -> Self {
        Self {
            name: name.to_string(),
            size,
        }
    }
}

impl Model for File {
    type Message = Self;

    fn table_name() -> &'static str {
        "File"
    }

    fn fields() -> Vec<FieldSpec> {
        fields![Name: String => primary_key, Size: i64]
    }

    fn to_row(&self) -> Row {
        Row::new().with("Name", &self.name).with("Size", self.size)
    }

    fn from_row(row: &Row) -> CollResult<Self> {
        Ok(Self {
            name: row.text("Name")?,
            size: row.integer("Size")?,
        })
    }

    fn write_message(&self) -> CollResult<Self> {
        Ok(self.clone())
    }

    fn load_message(message: &Self) -> CollResult<Self> {
        Ok(message.clone())
    }
}

/// Wire form of [`JobRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub owner: String,
    pub done: bool,
    pub due: DateTime<Utc>,
}

impl Job {
    pub fn new(id: &str, owner: &str) -> Self {
        Self {
            id: id.to_string(),
            owner: owner.to_string(),
            done: false,
            due: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobRow {
    id: String,
    owner: String,
    done: bool,
    due: DateTime<Utc>,
}

impl Model for JobRow {
    type Message = Job;

    fn table_name() -> &'static str {
        "Jobs"
    }

    fn fields() -> Vec<FieldSpec> {
        fields![
            Id: String => primary_key,
            Owner: String => indexed,
            Done: bool,
            Due: DateTime<Utc>,
        ]
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("Id", &self.id)
            .with("Owner", &self.owner)
            .with("Done", self.done)
            .with("Due", self.due)
    }

    fn from_row(row: &Row) -> CollResult<Self> {
        Ok(Self {
            id: row.text("Id")?,
            owner: row.text("Owner")?,
            done: row.boolean("Done")?,
            due: row.timestamp("Due")?,
        })
    }

    fn write_message(&self) -> CollResult<Job> {
        Ok(Job {
            id: self.id.clone(),
            owner: self.owner.clone(),
            done: self.done,
            due: self.due,
        })
    }

    fn load_message(message: &Job) -> CollResult<Self> {
        Ok(Self {
            id: message.id.clone(),
            owner: message.owner.clone(),
            done: message.done,
            due: message.due,
        })
    }
}

/// A model with an unmapped field type.
#[derive(Debug, Clone)]
pub struct Ratio;

impl Model for Ratio {
    type Message = ();

    fn table_name() -> &'static str {
        "Ratio"
    }

    fn fields() -> Vec<FieldSpec> {
        fields![Name: String => primary_key, Value: f64]
    }

    fn to_row(&self) -> Row {
        Row::new()
    }

    fn from_row(_: &Row) -> CollResult<Self> {
        Ok(Ratio)
    }

    fn write_message(&self) -> CollResult<()> {
        Ok(())
    }

    fn load_message(_: &()) -> CollResult<Self> {
        Ok(Ratio)
    }
}
