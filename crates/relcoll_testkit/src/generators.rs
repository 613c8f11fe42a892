//! Property-based test generators using proptest.

use proptest::prelude::*;

use crate::fixtures::scenarios::OWNERS;
use crate::models::FileRecord;

/// Strategy for primary keys drawn from a small alphabet.
///
/// The alphabet includes `%`, `_` and `\` so prefix scans are exercised with
/// pattern metacharacters. Keys collide often, which keeps create and delete
/// interesting.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[ab%_/\\]{1,4}").expect("invalid regex")
}

/// Strategy for prefixes over the same alphabet, possibly empty.
pub fn prefix_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[ab%_/\\]{0,3}").expect("invalid regex")
}

/// Strategy for one of the fixture owners.
pub fn owner_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(OWNERS.to_vec()).prop_map(str::to_string)
}

/// Strategy for a record stored under `key`.
pub fn record_strategy(key: String) -> impl Strategy<Value = FileRecord> {
    (0..1_000_i64, owner_strategy(), any::<bool>()).prop_map(move |(size, owner, archived)| {
        FileRecord {
            name: key.clone(),
            size,
            owner,
            archived,
        }
    })
}

/// A write applied through a read-write view.
#[derive(Debug, Clone)]
pub enum FileOperation {
    /// Create a record that must not exist.
    Create(FileRecord),
    /// Create or replace a record.
    Put(FileRecord),
    /// Add `delta` to the size of an existing record.
    Grow {
        /// Key to update.
        name: String,
        /// Size increment.
        delta: i64,
    },
    /// Remove an existing record.
    Delete {
        /// Key to remove.
        name: String,
    },
    /// Remove every record.
    DeleteAll,
}

/// Strategy for a single operation.
pub fn operation_strategy() -> impl Strategy<Value = FileOperation> {
    prop_oneof![
        3 => key_strategy().prop_flat_map(record_strategy).prop_map(FileOperation::Create),
        3 => key_strategy().prop_flat_map(record_strategy).prop_map(FileOperation::Put),
        2 => (key_strategy(), 1..10_i64).prop_map(|(name, delta)| FileOperation::Grow { name, delta }),
        2 => key_strategy().prop_map(|name| FileOperation::Delete { name }),
        1 => Just(FileOperation::DeleteAll),
    ]
}

/// Strategy for a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<FileOperation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Few cases, for backends that are slow to set up.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Many cases.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
