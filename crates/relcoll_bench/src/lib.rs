//! Benchmark utilities.

#![warn(missing_docs)]

use rand::distributions::Alphanumeric;
use rand::Rng;
use relcoll_codec::Row;
use relcoll_core::Model;
use relcoll_testkit::FileRecord;

/// Owners drawn from by [`random_record`].
pub const OWNERS: [&str; 4] = ["ann", "bob", "cat", "dan"];

/// A random alphanumeric string of `len` characters.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A record under `name` with a random size and owner.
pub fn random_record(name: impl Into<String>) -> FileRecord {
    let mut rng = rand::thread_rng();
    FileRecord {
        name: name.into(),
        size: rng.gen_range(0..1_000_000),
        owner: OWNERS[rng.gen_range(0..OWNERS.len())].to_string(),
        archived: rng.gen(),
    }
}

/// `count` records named `{prefix}{i:06}`.
pub fn generate_records(prefix: &str, count: usize) -> Vec<FileRecord> {
    (0..count)
        .map(|i| random_record(format!("{prefix}{i:06}")))
        .collect()
}

/// The row form of a random record whose name has `name_len` characters.
pub fn random_row(name_len: usize) -> Row {
    random_record(random_text(name_len)).to_row()
}
