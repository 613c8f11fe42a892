//! SQLite backend.
//!
//! One table per model, provisioned when the collection handle is built.
//! Every table carries two bookkeeping columns, `createdat` and
//! `updatedat`, stamped from a per-store monotonic clock and used for
//! ordered listing. Watch and claim are not offered.

mod collection;
mod error_map;
mod provision;
mod query;
mod read_only;
mod read_write;
mod rows;
mod store;
mod tx;

pub use collection::SqlCollection;
pub use provision::provision_statements;
pub use read_only::SqlReadOnly;
pub use read_write::SqlReadWrite;
pub use store::SqlStore;
pub use tx::SqlTx;

/// Backend name used in `Unsupported` errors.
pub const BACKEND: &str = "sqlite";
