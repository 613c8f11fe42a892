//! # relcoll core
//!
//! Typed, versioned collections over pluggable storage backends.
//!
//! This crate provides:
//! - Model descriptors and schema derivation ([`Model`], [`fields!`])
//! - The backend-neutral collection contract ([`CollectionHandle`],
//!   [`ReadOnlyCollection`], [`ReadWriteCollection`], [`TransactionRunner`])
//! - A SQLite backend ([`SqlStore`]) with idempotent table provisioning
//! - An in-memory revisioned backend ([`MemoryStore`]) with watch and claim
//!
//! ## Usage
//!
//! ```
//! use relcoll_core::{
//!     fields, CollResult, CollectionHandle, FieldSpec, Model, ReadContext,
//!     ReadOnlyCollection, ReadWriteCollection, Row, SqlStore, TransactionRunner,
//! };
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct File {
//!     name: String,
//!     size: i64,
//! }
//!
//! impl Model for File {
//!     type Message = Self;
//!
//!     fn table_name() -> &'static str {
//!         "File"
//!     }
//!
//!     fn fields() -> Vec<FieldSpec> {
//!         fields![Name: String => primary_key, Size: i64]
//!     }
//!
//!     fn to_row(&self) -> Row {
//!         Row::new().with("Name", &self.name).with("Size", self.size)
//!     }
//!
//!     fn from_row(row: &Row) -> CollResult<Self> {
//!         Ok(Self { name: row.text("Name")?, size: row.integer("Size")? })
//!     }
//!
//!     fn write_message(&self) -> CollResult<Self> {
//!         Ok(self.clone())
//!     }
//!
//!     fn load_message(message: &Self) -> CollResult<Self> {
//!         Ok(message.clone())
//!     }
//! }
//!
//! let store = SqlStore::open_in_memory().unwrap();
//! let files = store.collection::<File>().unwrap();
//! let f1 = File { name: "f1".into(), size: 10 };
//!
//! store
//!     .run_in_transaction(|tx| files.read_write(tx).create("f1", &f1))
//!     .unwrap();
//!
//! let found = files.read_only(&ReadContext::background()).get("f1").unwrap();
//! assert_eq!(found, f1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod context;
mod error;
mod model;
mod schema;
mod transaction;
mod types;
mod watch;

pub mod memory;
pub mod sql;

pub use collection::{
    CollectionHandle, Filters, ReadOnlyCollection, ReadWriteCollection, TransactionRunner,
};
pub use config::{JournalMode, MemoryStoreConfig, StoreConfig, DEFAULT_TRANSACTION_ATTEMPTS};
pub use context::{CancelGuard, ReadContext};
pub use error::{is_already_exists, is_not_found, is_unsupported, CollError, CollResult};
pub use memory::{MemoryCollection, MemoryStore, MemoryTx};
pub use model::{FieldSpec, Model};
pub use schema::{derive_schema, storage_type_for, Index, SchemaInfo, SqlField, StorageType};
pub use sql::{SqlCollection, SqlStore, SqlTx};
pub use transaction::retry_transaction;
pub use types::{Capabilities, ListOptions, RowOrder, SortOrder, SortTarget};
pub use watch::{ChangeEvent, EventType, WatchEvent, WatchOptions, Watcher};

pub use relcoll_codec::{Row, Value};
