//! Oracle-backed replay harness.
//!
//! [`Harness`] applies [`FileOperation`]s to a collection and to an
//! in-process model of what the collection should contain, asserting after
//! each step that the backend agrees with the model.

use std::collections::BTreeMap;

use relcoll_core::{
    is_already_exists, is_not_found, CollResult, CollectionHandle, ListOptions, ReadContext,
    ReadOnlyCollection, ReadWriteCollection, TransactionRunner,
};

use crate::generators::FileOperation;
use crate::models::FileRecord;

/// Expected result of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The write was applied.
    Applied,
    /// The key was already present.
    AlreadyExists,
    /// The key was absent.
    NotFound,
}

/// Replays operations against a collection and a model of its contents.
pub struct Harness<H: CollectionHandle<FileRecord>> {
    handle: H,
    expected: BTreeMap<String, FileRecord>,
}

impl<H: CollectionHandle<FileRecord>> Harness<H> {
    /// Wraps an empty collection.
    pub fn new(handle: H) -> Self {
        Self {
            handle,
            expected: BTreeMap::new(),
        }
    }

    /// The wrapped handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// The model's current contents.
    pub fn expected(&self) -> &BTreeMap<String, FileRecord> {
        &self.expected
    }

    /// Applies `op` in its own transaction and checks the outcome.
    pub fn apply(&mut self, op: &FileOperation) -> Outcome {
        let predicted = self.predict(op);
        let result = self.handle.runner().run_in_transaction(|tx| {
            let rw = self.handle.read_write(tx);
            match op {
                FileOperation::Create(record) => rw.create(&record.name, record),
                FileOperation::Put(record) => rw.put(&record.name, record),
                FileOperation::Grow { name, delta } => rw
                    .update(name, |f| {
                        Ok(FileRecord {
                            size: f.size + delta,
                            ..f
                        })
                    })
                    .map(|_| ()),
                FileOperation::Delete { name } => rw.delete(name),
                FileOperation::DeleteAll => rw.delete_all(),
            }
        });
        let actual = classify(result);
        assert_eq!(actual, predicted, "outcome mismatch for {op:?}");
        if actual == Outcome::Applied {
            self.record(op);
        }
        actual
    }

    /// Checks every read path against the model.
    pub fn verify(&self) {
        let view = self.handle.read_only(&ReadContext::background());
        let count = view.count().expect("count failed");
        assert_eq!(count, self.expected.len() as i64, "count mismatch");

        let listed = collect(|f| view.list(&ListOptions::default(), f));
        let expected: Vec<_> = self.expected.values().cloned().collect();
        assert_eq!(listed, expected, "list mismatch");

        for (key, record) in &self.expected {
            assert_eq!(&view.get(key).expect("get failed"), record);
        }
    }

    /// Checks a prefix scan against the model.
    pub fn verify_prefix(&self, prefix: &str) {
        let view = self.handle.read_only(&ReadContext::background());
        let listed = collect(|f| view.list_prefix(prefix, &ListOptions::default(), f));
        let expected: Vec<_> = self
            .expected
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, record)| record.clone())
            .collect();
        assert_eq!(listed, expected, "prefix {prefix:?} mismatch");
    }

    /// Model contents as JSON, keyed by primary key.
    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.expected).expect("records serialize")
    }

    fn predict(&self, op: &FileOperation) -> Outcome {
        let present = |key: &str| self.expected.contains_key(key);
        match op {
            FileOperation::Create(record) if present(&record.name) => Outcome::AlreadyExists,
            FileOperation::Grow { name, .. } | FileOperation::Delete { name } if !present(name) => {
                Outcome::NotFound
            }
            _ => Outcome::Applied,
        }
    }

    fn record(&mut self, op: &FileOperation) {
        match op {
            FileOperation::Create(record) | FileOperation::Put(record) => {
                self.expected.insert(record.name.clone(), record.clone());
            }
            FileOperation::Grow { name, delta } => {
                if let Some(record) = self.expected.get_mut(name) {
                    record.size += delta;
                }
            }
            FileOperation::Delete { name } => {
                self.expected.remove(name);
            }
            FileOperation::DeleteAll => self.expected.clear(),
        }
    }
}

/// Reads every record of a collection as JSON, keyed by primary key.
pub fn collection_json<H: CollectionHandle<FileRecord>>(handle: &H) -> serde_json::Value {
    let view = handle.read_only(&ReadContext::background());
    let records: BTreeMap<String, FileRecord> =
        collect(|f| view.list(&ListOptions::default(), f))
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
    serde_json::to_value(records).expect("records serialize")
}

fn classify(result: CollResult<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Applied,
        Err(err) if is_already_exists(&err) => Outcome::AlreadyExists,
        Err(err) if is_not_found(&err) => Outcome::NotFound,
        Err(err) => panic!("unexpected error: {err}"),
    }
}

fn collect<F>(scan: F) -> Vec<FileRecord>
where
    F: FnOnce(&mut dyn FnMut(FileRecord) -> CollResult<()>) -> CollResult<()>,
{
    let mut out = Vec::new();
    scan(&mut |record| {
        out.push(record);
        Ok(())
    })
    .expect("scan failed");
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::memory_store;

    #[test]
    fn harness_tracks_outcomes() {
        let store = memory_store();
        let mut harness = Harness::new(store.collection::<FileRecord>().unwrap());

        let a = FileRecord::new("a", 1, "ann");
        assert_eq!(harness.apply(&FileOperation::Create(a.clone())), Outcome::Applied);
        assert_eq!(harness.apply(&FileOperation::Create(a)), Outcome::AlreadyExists);
        assert_eq!(
            harness.apply(&FileOperation::Grow { name: "b".into(), delta: 1 }),
            Outcome::NotFound
        );
        harness.apply(&FileOperation::Grow { name: "a".into(), delta: 4 });
        harness.verify();
        assert_eq!(harness.expected()["a"].size, 5);
        assert_eq!(harness.snapshot_json(), collection_json(harness.handle()));
    }
}
