//! # relcoll testkit
//!
//! Test utilities for relcoll.
//!
//! This crate provides:
//! - Sample models ([`FileRecord`])
//! - Store fixtures with automatic cleanup
//! - Property-based generators using proptest
//! - An oracle-backed harness that replays operations against any backend
//! - Conformance checks every backend must pass
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relcoll_testkit::prelude::*;
//!
//! #[test]
//! fn sqlite_conforms() {
//!     let store = TestSqlStore::memory();
//!     run_conformance(|| store.collection::<FileRecord>().unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod models;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::models::*;
}

pub use conformance::run_conformance;
pub use fixtures::{init_test_tracing, TestSqlStore};
pub use integration::Harness;
pub use models::FileRecord;
