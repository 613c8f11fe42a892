//! Schema derivation.
//!
//! A model's field declarations are turned into a [`SchemaInfo`] exactly
//! once, when a collection handle is built. Every later operation on that
//! handle (and on handles cloned from it) reuses the same value.

mod derive;
mod info;

pub use derive::{derive_schema, storage_type_for};
pub use info::{Index, SchemaInfo, SqlField, StorageType};
