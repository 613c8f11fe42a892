//! In-memory revisioned key/value backend.
//!
//! Rows are stored as canonical CBOR under their primary key, with the
//! revisions at which they were created and last modified. Every commit
//! advances a store-wide revision and publishes its changes to a
//! [`ChangeFeed`], which backs watches. Claims are exclusive per-key
//! leases held for the duration of a callback.

mod change_feed;
mod collection;
mod read_only;
mod read_write;
mod store;
mod tx;

pub use change_feed::{ChangeFeed, EventFilter};
pub use collection::MemoryCollection;
pub use read_only::MemoryReadOnly;
pub use read_write::MemoryReadWrite;
pub use store::{MemoryStore, WriteConflict};
pub use tx::{MemoryTx, TransactionState};
