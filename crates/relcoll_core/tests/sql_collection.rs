//! SQLite backend behaviour.

mod common;

use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{File, Job, JobRow, Ratio};
use relcoll_core::sql::provision_statements;
use relcoll_core::{
    is_already_exists, is_not_found, is_unsupported, Capabilities, CollError, CollectionHandle,
    ListOptions, ReadContext, ReadOnlyCollection, ReadWriteCollection, SortTarget, SqlStore,
    StoreConfig, TransactionRunner, WatchOptions,
};
use tempfile::TempDir;

fn file_store() -> (TempDir, SqlStore) {
    let dir = TempDir::new().unwrap();
    let store = SqlStore::open_path(dir.path().join("files.db")).unwrap();
    (dir, store)
}

fn seed(store: &SqlStore, files: &relcoll_core::SqlCollection<File>, entries: &[(&str, i64)]) {
    store
        .run_in_transaction(|tx| {
            let rw = files.read_write(tx);
            for (name, size) in entries {
                rw.create(name, &File::new(name, *size))?;
            }
            Ok(())
        })
        .unwrap();
}

fn keys(view: &impl ReadOnlyCollection<File>, prefix: Option<&str>, opts: &ListOptions) -> Vec<String> {
    let mut out = Vec::new();
    let collect = |f: File| {
        out.push(f.name);
        Ok(())
    };
    match prefix {
        Some(p) => view.list_prefix(p, opts, collect).unwrap(),
        None => view.list(opts, collect).unwrap(),
    }
    out
}

#[test]
fn provisioning_is_idempotent() {
    let (_dir, store) = file_store();
    let first = store.collection::<File>().unwrap();
    seed(&store, &first, &[("f1", 1)]);

    let second = store.collection::<File>().unwrap();
    let count = second.read_only(&ReadContext::background()).count().unwrap();
    assert_eq!(count, 1);
}

#[test]
fn provisioning_ddl() {
    let files = SqlStore::open_in_memory().unwrap().collection::<File>().unwrap();
    assert_eq!(
        provision_statements(files.schema()),
        vec![
            "create table if not exists file (name varchar, size bigint, \
             createdat timestamp not null, updatedat timestamp not null, primary key(name))"
                .to_string()
        ]
    );

    let jobs = SqlStore::open_in_memory().unwrap().collection::<JobRow>().unwrap();
    let ddl = provision_statements(jobs.schema());
    assert_eq!(ddl.len(), 2);
    assert_eq!(
        ddl[1],
        "create index if not exists jobs_owner_idx on jobs (owner)"
    );
}

#[test]
fn invalid_model_fails_construction() {
    let store = SqlStore::open_in_memory().unwrap();
    let err = store.collection::<Ratio>().unwrap_err();
    assert_eq!(err.to_string(), "configuration error: no storage type for f64");
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("files.db");
    {
        let store = SqlStore::open_path(&path).unwrap();
        let files = store.collection::<File>().unwrap();
        seed(&store, &files, &[("f1", 10), ("f2", 20)]);
    }
    let store = SqlStore::open_path(&path).unwrap();
    let files = store.collection::<File>().unwrap();
    let view = files.read_only(&ReadContext::background());
    assert_eq!(view.get("f2").unwrap(), File::new("f2", 20));
    assert_eq!(view.count().unwrap(), 2);
}

#[test]
fn read_write_get_sees_own_writes() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    store
        .run_in_transaction(|tx| {
            let rw = files.read_write(tx);
            rw.create("f1", &File::new("f1", 1))?;
            assert_eq!(rw.get("f1")?.size, 1);
            Ok(())
        })
        .unwrap();
}

#[test]
fn failed_work_rolls_back() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    seed(&store, &files, &[("f1", 1)]);

    let err = store
        .run_in_transaction(|tx| {
            let rw = files.read_write(tx);
            rw.create("f2", &File::new("f2", 2))?;
            rw.create("f1", &File::new("f1", 9))
        })
        .unwrap_err();
    assert!(is_already_exists(&err));

    let view = files.read_only(&ReadContext::background());
    assert!(is_not_found(&view.get("f2").unwrap_err()));
    assert_eq!(view.get("f1").unwrap().size, 1);
}

#[test]
fn transient_failure_is_retried_once() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    let calls = Cell::new(0);

    store
        .run_in_transaction(|tx| {
            calls.set(calls.get() + 1);
            files.read_write(tx).create("f1", &File::new("f1", 1))?;
            if tx.attempt() == 1 {
                return Err(CollError::store(
                    "simulated",
                    std::io::Error::other("database is locked"),
                ));
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(calls.get(), 2);
    let count = files.read_only(&ReadContext::background()).count().unwrap();
    assert_eq!(count, 1);
}

#[test]
fn retries_are_bounded() {
    let store = SqlStore::open(StoreConfig::new().transaction_attempts(3)).unwrap();
    let calls = Cell::new(0);
    let err = store
        .run_in_transaction::<(), _>(|_| {
            calls.set(calls.get() + 1);
            Err(CollError::store("simulated", std::io::Error::other("busy")))
        })
        .unwrap_err();
    assert_eq!(calls.get(), 3);
    match err {
        CollError::TransactionRetriesExhausted { attempts } => assert_eq!(attempts.len(), 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn create_requires_matching_key() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    let err = store
        .run_in_transaction(|tx| files.read_write(tx).create("f1", &File::new("other", 1)))
        .unwrap_err();
    assert!(matches!(err, CollError::InvalidOperation { .. }));
}

#[test]
fn ordering_by_creation_and_modification() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    for name in ["c", "a", "b"] {
        seed(&store, &files, &[(name, 0)]);
    }
    let view = files.read_only(&ReadContext::background());

    let created_desc = ListOptions::descending(SortTarget::CreateRevision);
    assert_eq!(keys(&view, None, &created_desc), vec!["b", "a", "c"]);
    let created_asc = ListOptions::ascending(SortTarget::CreateRevision);
    assert_eq!(keys(&view, None, &created_asc), vec!["c", "a", "b"]);

    store
        .run_in_transaction(|tx| {
            files
                .read_write(tx)
                .update("c", |f| Ok(File { size: 5, ..f }))
        })
        .unwrap();
    let modified_desc = ListOptions::descending(SortTarget::ModRevision);
    assert_eq!(keys(&view, None, &modified_desc), vec!["c", "b", "a"]);
    // Creation order is unaffected by the update.
    assert_eq!(keys(&view, None, &created_asc), vec!["c", "a", "b"]);
}

#[test]
fn unsupported_sort_target_is_configuration_error() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    let err = files
        .read_only(&ReadContext::background())
        .list(&ListOptions::ascending(SortTarget::Key), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, CollError::Configuration { .. }));
}

#[test]
fn prefix_is_matched_literally() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    seed(
        &store,
        &files,
        &[("a/1", 1), ("a/2", 2), ("ab", 3), ("b/x", 4), ("a%1", 5), ("a_1", 6), ("A/3", 7)],
    );
    let view = files.read_only(&ReadContext::background());
    let opts = ListOptions::default();

    let mut found = keys(&view, Some("a/"), &opts);
    found.sort();
    assert_eq!(found, vec!["a/1", "a/2"]);
    assert_eq!(keys(&view, Some("a%"), &opts), vec!["a%1"]);
    assert_eq!(keys(&view, Some("a_"), &opts), vec!["a_1"]);
}

#[test]
fn callback_error_stops_scan() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    seed(&store, &files, &[("f1", 1), ("f2", 2), ("f3", 3)]);

    let mut seen = 0;
    let err = files
        .read_only(&ReadContext::background())
        .list(&ListOptions::default(), |_| {
            seen += 1;
            Err(CollError::invalid_operation("stop"))
        })
        .unwrap_err();
    assert_eq!(seen, 1);
    assert_eq!(err.to_string(), "invalid operation: stop");
}

#[test]
fn cancelled_context_delivers_nothing() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    seed(&store, &files, &[("f1", 1)]);

    let ctx = ReadContext::background();
    ctx.cancel();
    let mut seen = 0;
    let err = files
        .read_only(&ctx)
        .list(&ListOptions::default(), |_| {
            seen += 1;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, CollError::Cancelled));
    assert_eq!(seen, 0);
}

#[test]
fn cancel_mid_scan_stops_iteration() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    seed(&store, &files, &[("f1", 1), ("f2", 2), ("f3", 3)]);

    let ctx = ReadContext::background();
    let mut seen = 0;
    let err = files
        .read_only(&ctx)
        .list(&ListOptions::default(), |_| {
            seen += 1;
            ctx.cancel();
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, CollError::Cancelled));
    assert_eq!(seen, 1);
    assert_eq!(ctx.hook_count(), 0);
}

#[test]
fn list_callback_can_write_to_in_memory_store() {
    let store = SqlStore::open(StoreConfig::new().busy_timeout(Duration::from_millis(300))).unwrap();
    let files = store.collection::<File>().unwrap();
    seed(&store, &files, &[("f1", 1), ("f2", 2), ("f3", 3)]);

    files
        .read_only(&ReadContext::background())
        .list(&ListOptions::default(), |file| {
            store.run_in_transaction(|tx| {
                files.read_write(tx).update(&file.name, |mut f| {
                    f.size *= 10;
                    Ok(f)
                })
            })?;
            Ok(())
        })
        .unwrap();

    let mut sizes = Vec::new();
    files
        .read_only(&ReadContext::background())
        .list(&ListOptions::default(), |f| {
            sizes.push(f.size);
            Ok(())
        })
        .unwrap();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![10, 20, 30]);
}

#[test]
fn with_filters_apply_to_reads() {
    let store = SqlStore::open_in_memory().unwrap();
    let jobs = store.collection::<JobRow>().unwrap();
    store
        .run_in_transaction(|tx| {
            let rw = jobs.read_write(tx);
            rw.create("j1", &Job::new("j1", "ann"))?;
            rw.create("j2", &Job::new("j2", "bob"))?;
            rw.create("j3", &Job::new("j3", "ann"))?;
            Ok(())
        })
        .unwrap();

    let ctx = ReadContext::background();
    let anns = jobs.with("Owner", "ann");
    assert_eq!(anns.read_only(&ctx).count().unwrap(), 2);
    assert!(is_not_found(&anns.read_only(&ctx).get("j2").unwrap_err()));
    // The receiver is unchanged.
    assert_eq!(jobs.read_only(&ctx).count().unwrap(), 3);

    let index = jobs.schema().index("Owner").unwrap();
    let first = jobs.read_only(&ctx).get_by_index(&index, "bob").unwrap();
    assert_eq!(first.id, "j2");
    let err = jobs.read_only(&ctx).get_by_index(&index, "cat").unwrap_err();
    assert!(is_not_found(&err));

    let mut ids = Vec::new();
    jobs.read_only(&ctx)
        .list_by_index(&index, "ann", &ListOptions::ascending(SortTarget::CreateRevision), |j| {
            ids.push(j.id);
            Ok(())
        })
        .unwrap();
    assert_eq!(ids, vec!["j1", "j3"]);
}

#[test]
fn unknown_filter_field_is_configuration_error() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    let err = files
        .with("Color", "red")
        .read_only(&ReadContext::background())
        .count()
        .unwrap_err();
    assert!(matches!(err, CollError::Configuration { .. }));
}

#[test]
fn typed_columns_round_trip() {
    let store = SqlStore::open_in_memory().unwrap();
    let jobs = store.collection::<JobRow>().unwrap();
    let mut job = Job::new("j1", "ann");
    job.done = true;
    job.due = chrono::Utc::now();

    store
        .run_in_transaction(|tx| jobs.read_write(tx).put("j1", &job))
        .unwrap();
    let stored = jobs.read_only(&ReadContext::background()).get("j1").unwrap();
    assert_eq!(stored, job);
    let done = jobs
        .with("Done", true)
        .read_only(&ReadContext::background())
        .count()
        .unwrap();
    assert_eq!(done, 1);
}

#[test]
fn delete_all_is_transactional() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    seed(&store, &files, &[("f1", 1), ("f2", 2)]);

    let err = store
        .run_in_transaction::<(), _>(|tx| {
            files.read_write(tx).delete_all()?;
            Err(CollError::invalid_operation("abort"))
        })
        .unwrap_err();
    assert!(matches!(err, CollError::InvalidOperation { .. }));
    let view = files.read_only(&ReadContext::background());
    assert_eq!(view.count().unwrap(), 2);

    store
        .run_in_transaction(|tx| files.read_write(tx).delete_all())
        .unwrap();
    assert_eq!(view.count().unwrap(), 0);
}

#[test]
fn purge_bypasses_the_transaction() {
    let (_dir, store) = file_store();
    let files = store.collection::<File>().unwrap();
    seed(&store, &files, &[("f1", 1), ("f2", 2)]);
    assert_eq!(files.purge_outside_transaction().unwrap(), 2);
    assert_eq!(
        files.read_only(&ReadContext::background()).count().unwrap(),
        0
    );
}

#[test]
fn watch_and_claim_are_unsupported() {
    let store = SqlStore::open_in_memory().unwrap();
    let files = store.collection::<File>().unwrap();
    assert_eq!(files.capabilities(), Capabilities::NONE);

    let view = files.read_only(&ReadContext::background());
    assert_eq!(view.capabilities(), Capabilities::NONE);
    let err = view.watch(&WatchOptions::new()).unwrap_err();
    assert!(is_unsupported(&err));
    assert_eq!(err.to_string(), "watch is not supported on sqlite collections");
    assert!(is_unsupported(&view.watch_one("f1", &WatchOptions::new()).unwrap_err()));

    let called = Cell::new(false);
    let err = store
        .run_in_transaction(|tx| {
            files.read_write(tx).claim("f1", &File::new("f1", 1), |_| {
                called.set(true);
                Ok(())
            })
        })
        .unwrap_err();
    assert!(is_unsupported(&err));
    assert!(!called.get());
}

#[test]
fn concurrent_readers_and_writer() {
    let (_dir, store) = file_store();
    let files = Arc::new(store.collection::<File>().unwrap());

    let writer = {
        let files = Arc::clone(&files);
        let store = store.clone();
        thread::spawn(move || {
            for i in 0..50 {
                let name = format!("f{i:02}");
                store
                    .run_in_transaction(|tx| files.read_write(tx).put(&name, &File::new(&name, i)))
                    .unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let files = Arc::clone(&files);
            thread::spawn(move || {
                let view = files.read_only(&ReadContext::with_timeout(Duration::from_secs(30)));
                let mut last = 0;
                for _ in 0..50 {
                    let count = view.count().unwrap();
                    assert!(count >= last);
                    last = count;
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(
        files.read_only(&ReadContext::background()).count().unwrap(),
        50
    );
}
