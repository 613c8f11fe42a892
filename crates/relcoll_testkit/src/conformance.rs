//! Behaviour every backend must share.
//!
//! Each check takes a fresh, empty collection and panics on the first
//! divergence. [`run_conformance`] runs them all.

use std::cell::Cell;

use relcoll_core::{
    is_already_exists, is_not_found, is_unsupported, CollError, CollResult, CollectionHandle,
    ListOptions, ReadContext, ReadOnlyCollection, ReadWriteCollection, SortTarget,
    TransactionRunner, WatchOptions,
};

use crate::fixtures::scenarios;
use crate::models::FileRecord;

/// Runs every check, each against a collection from `make`.
pub fn run_conformance<H, F>(make: F)
where
    H: CollectionHandle<FileRecord>,
    F: Fn() -> H,
{
    check_create_and_get(&make());
    check_update_missing_skips_mutation(&make());
    check_upsert(&make());
    check_delete(&make());
    check_delete_all_is_transactional(&make());
    check_prefix_is_literal(&make());
    check_filters_narrow_reads(&make());
    check_index_lookup(&make());
    check_creation_order(&make());
    check_cancelled_context(&make());
    check_writes_from_list_callback(&make());
    check_capabilities(&make());
}

fn write<H, T, F>(handle: &H, mut work: F) -> CollResult<T>
where
    H: CollectionHandle<FileRecord>,
    F: FnMut(&H::ReadWrite<'_>) -> CollResult<T>,
{
    handle
        .runner()
        .run_in_transaction(|tx| work(&handle.read_write(tx)))
}

fn names<V: ReadOnlyCollection<FileRecord>>(view: &V, prefix: &str, opts: &ListOptions) -> Vec<String> {
    let mut out = Vec::new();
    view.list_prefix(prefix, opts, |f| {
        out.push(f.name);
        Ok(())
    })
    .expect("list_prefix failed");
    out
}

/// Create then get; duplicates and missing keys map to the shared errors.
pub fn check_create_and_get<H: CollectionHandle<FileRecord>>(handle: &H) {
    let record = FileRecord::new("f1", 10, "ann");
    write(handle, |rw| rw.create("f1", &record)).expect("create failed");

    let err = write(handle, |rw| rw.create("f1", &record)).unwrap_err();
    assert!(is_already_exists(&err), "duplicate create: {err}");

    let view = handle.read_only(&ReadContext::background());
    assert_eq!(view.get("f1").expect("get failed"), record);
    let err = view.get("f2").unwrap_err();
    assert!(is_not_found(&err), "missing get: {err}");
}

/// Updating a missing key fails with not-found without calling the mutation.
pub fn check_update_missing_skips_mutation<H: CollectionHandle<FileRecord>>(handle: &H) {
    let called = Cell::new(false);
    let err = write(handle, |rw| {
        rw.update("nope", |f| {
            called.set(true);
            Ok(f)
        })
    })
    .unwrap_err();
    assert!(is_not_found(&err), "update missing: {err}");
    assert!(!called.get(), "mutation ran for a missing key");
}

/// Upsert seeds from the initial value, then mutates the stored one.
pub fn check_upsert<H: CollectionHandle<FileRecord>>(handle: &H) {
    let initial = FileRecord::new("u", 1, "ann");
    let grow = |f: FileRecord| {
        Ok(FileRecord {
            size: f.size * 10,
            ..f
        })
    };
    let first = write(handle, |rw| rw.upsert("u", initial.clone(), grow)).expect("upsert failed");
    assert_eq!(first.size, 10);
    let second = write(handle, |rw| rw.upsert("u", initial.clone(), grow)).expect("upsert failed");
    assert_eq!(second.size, 100);
}

/// Delete removes exactly one row; a second delete is not-found.
pub fn check_delete<H: CollectionHandle<FileRecord>>(handle: &H) {
    scenarios::populate(handle, 3);
    let name = scenarios::file_name(1);
    write(handle, |rw| rw.delete(&name)).expect("delete failed");
    let err = write(handle, |rw| rw.delete(&name)).unwrap_err();
    assert!(is_not_found(&err), "second delete: {err}");
    let count = handle
        .read_only(&ReadContext::background())
        .count()
        .expect("count failed");
    assert_eq!(count, 2);
}

/// A failed transaction leaves rows removed by `delete_all` in place.
pub fn check_delete_all_is_transactional<H: CollectionHandle<FileRecord>>(handle: &H) {
    scenarios::populate(handle, 3);
    let err = write::<_, (), _>(handle, |rw| {
        rw.delete_all()?;
        Err(CollError::invalid_operation("abort"))
    })
    .unwrap_err();
    assert!(matches!(err, CollError::InvalidOperation { .. }));

    let view = handle.read_only(&ReadContext::background());
    assert_eq!(view.count().expect("count failed"), 3);
    write(handle, |rw| rw.delete_all()).expect("delete_all failed");
    assert_eq!(view.count().expect("count failed"), 0);
}

/// A list callback may run write transactions against the same collection.
pub fn check_writes_from_list_callback<H: CollectionHandle<FileRecord>>(handle: &H) {
    scenarios::populate(handle, 3);
    let view = handle.read_only(&ReadContext::background());
    view.list(&ListOptions::default(), |file| {
        write(handle, |rw| {
            rw.update(&file.name, |f| {
                Ok(FileRecord {
                    size: f.size + 1000,
                    ..f
                })
            })
        })?;
        Ok(())
    })
    .expect("list with writing callback failed");

    let mut grown = 0;
    view.list(&ListOptions::default(), |f| {
        assert!(f.size >= 1000, "{} was not updated", f.name);
        grown += 1;
        Ok(())
    })
    .expect("list failed");
    assert_eq!(grown, 3);
}

/// `%`, `_` and `\` in a prefix match themselves only.
pub fn check_prefix_is_literal<H: CollectionHandle<FileRecord>>(handle: &H) {
    let keys = ["a%b", "axb", "a_b", "a\\b", "A%b", "a%"];
    write(handle, |rw| {
        for key in keys {
            rw.create(key, &FileRecord::new(key, 0, "ann"))?;
        }
        Ok(())
    })
    .expect("seed failed");

    let view = handle.read_only(&ReadContext::background());
    let sorted = |prefix: &str| {
        let mut found = names(&view, prefix, &ListOptions::default());
        found.sort();
        found
    };
    assert_eq!(sorted("a%"), vec!["a%", "a%b"]);
    assert_eq!(sorted("a_"), vec!["a_b"]);
    assert_eq!(sorted("a\\"), vec!["a\\b"]);
    assert_eq!(sorted("").len(), keys.len());
}

/// `with` narrows every read and leaves the original handle alone.
pub fn check_filters_narrow_reads<H: CollectionHandle<FileRecord>>(handle: &H) {
    scenarios::populate(handle, 6);
    let ctx = ReadContext::background();
    let bobs = handle.with("Owner", "bob");

    assert_eq!(bobs.read_only(&ctx).count().expect("count failed"), 2);
    assert_eq!(handle.read_only(&ctx).count().expect("count failed"), 6);
    assert_eq!(handle.filters().len(), 0);
    assert_eq!(bobs.filters().len(), 1);

    let anns_file = scenarios::file_name(0);
    let err = bobs.read_only(&ctx).get(&anns_file).unwrap_err();
    assert!(is_not_found(&err), "filtered get: {err}");
    let err = write(&bobs, |rw| rw.get(&anns_file)).unwrap_err();
    assert!(is_not_found(&err), "filtered read-write get: {err}");

    // Updates read by key only.
    let updated = write(&bobs, |rw| {
        rw.update(&anns_file, |f| Ok(FileRecord { size: 99, ..f }))
    })
    .expect("update through filtered handle failed");
    assert_eq!(updated.owner, "ann");

    let both = bobs.with("Size", 4_i64);
    assert_eq!(both.read_only(&ctx).count().expect("count failed"), 1);

    let err = handle
        .with("Colour", "red")
        .read_only(&ctx)
        .count()
        .unwrap_err();
    assert!(matches!(err, CollError::Configuration { .. }), "{err}");
}

/// Index lookups find the first match and list all matches.
pub fn check_index_lookup<H: CollectionHandle<FileRecord>>(handle: &H) {
    scenarios::populate(handle, 6);
    let index = handle.schema().index("Owner").expect("owner index");
    let view = handle.read_only(&ReadContext::background());

    let found = view.get_by_index(&index, "cat").expect("get_by_index failed");
    assert_eq!(found.owner, "cat");
    let err = view.get_by_index(&index, "dan").unwrap_err();
    assert!(is_not_found(&err), "missing index value: {err}");

    let mut owned = Vec::new();
    view.list_by_index(
        &index,
        "ann",
        &ListOptions::ascending(SortTarget::CreateRevision),
        |f| {
            owned.push(f.name);
            Ok(())
        },
    )
    .expect("list_by_index failed");
    assert_eq!(owned, vec![scenarios::file_name(0), scenarios::file_name(3)]);
}

/// Revision ordering follows creation and modification order.
pub fn check_creation_order<H: CollectionHandle<FileRecord>>(handle: &H) {
    for key in ["m", "z", "a"] {
        write(handle, |rw| rw.create(key, &FileRecord::new(key, 0, "ann"))).expect("create failed");
    }
    write(handle, |rw| rw.update("z", |f| Ok(FileRecord { size: 1, ..f }))).expect("update failed");

    let view = handle.read_only(&ReadContext::background());
    assert_eq!(
        names(&view, "", &ListOptions::descending(SortTarget::CreateRevision)),
        vec!["a", "z", "m"]
    );
    assert_eq!(
        names(&view, "", &ListOptions::descending(SortTarget::ModRevision)),
        vec!["z", "a", "m"]
    );
    let err = view
        .list(&ListOptions::ascending(SortTarget::Value), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, CollError::Configuration { .. }), "{err}");
}

/// A cancelled context fails reads before any callback runs.
pub fn check_cancelled_context<H: CollectionHandle<FileRecord>>(handle: &H) {
    scenarios::populate(handle, 2);
    let ctx = ReadContext::background();
    ctx.cancel();
    let view = handle.read_only(&ctx);

    let mut seen = 0;
    let err = view
        .list(&ListOptions::default(), |_| {
            seen += 1;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, CollError::Cancelled), "{err}");
    assert_eq!(seen, 0);
    assert!(matches!(view.count().unwrap_err(), CollError::Cancelled));
}

/// Optional operations fail with unsupported exactly when not advertised.
pub fn check_capabilities<H: CollectionHandle<FileRecord>>(handle: &H) {
    let caps = handle.capabilities();
    let view = handle.read_only(&ReadContext::background());
    assert_eq!(view.capabilities(), caps);

    let watch = view.watch(&WatchOptions::new());
    assert_eq!(watch.is_ok(), caps.watch);
    if let Err(err) = watch {
        assert!(is_unsupported(&err), "{err}");
    }

    let record = FileRecord::new("claimed", 1, "ann");
    let ran = Cell::new(false);
    let claim = write(handle, |rw| {
        assert_eq!(rw.capabilities(), caps);
        rw.claim("claimed", &record, |_| {
            ran.set(true);
            Ok(())
        })
    });
    assert_eq!(claim.is_ok(), caps.claim);
    assert_eq!(ran.get(), caps.claim);
    if let Err(err) = claim {
        assert!(is_unsupported(&err), "{err}");
    }
}
