//! The same file catalogue scenario against every backend.

mod common;

use std::cell::Cell;

use common::File;
use relcoll_core::{
    is_already_exists, is_not_found, CollectionHandle, ListOptions, MemoryStore, ReadContext,
    ReadOnlyCollection, ReadWriteCollection, SortTarget, SqlStore, TransactionRunner,
};

fn names<V: ReadOnlyCollection<File>>(view: &V, prefix: Option<&str>) -> Vec<String> {
    let opts = ListOptions::ascending(SortTarget::CreateRevision);
    let mut out = Vec::new();
    let push = |f: File| {
        out.push(f.name);
        Ok(())
    };
    match prefix {
        Some(p) => view.list_prefix(p, &opts, push).unwrap(),
        None => view.list(&opts, push).unwrap(),
    }
    out
}

fn catalogue<H: CollectionHandle<File>>(files: H) {
    let runner = files.runner();
    let ctx = ReadContext::background();

    // Create, then reject a duplicate.
    runner
        .run_in_transaction(|tx| {
            let rw = files.read_write(tx);
            rw.create("docs/a", &File::new("docs/a", 10))?;
            rw.create("docs/b", &File::new("docs/b", 20))?;
            rw.create("img/c", &File::new("img/c", 30))
        })
        .unwrap();
    let err = runner
        .run_in_transaction(|tx| files.read_write(tx).create("docs/a", &File::new("docs/a", 1)))
        .unwrap_err();
    assert!(is_already_exists(&err));

    let view = files.read_only(&ctx);
    assert_eq!(view.get("docs/b").unwrap(), File::new("docs/b", 20));
    assert!(is_not_found(&view.get("docs/z").unwrap_err()));
    assert_eq!(view.count().unwrap(), 3);
    assert_eq!(names(&view, Some("docs/")), vec!["docs/a", "docs/b"]);

    // Update of a missing key never invokes the mutation.
    let called = Cell::new(false);
    let err = runner
        .run_in_transaction(|tx| {
            files.read_write(tx).update("docs/z", |f| {
                called.set(true);
                Ok(f)
            })
        })
        .unwrap_err();
    assert!(is_not_found(&err));
    assert!(!called.get());

    let updated = runner
        .run_in_transaction(|tx| {
            files
                .read_write(tx)
                .update("docs/a", |f| Ok(File { size: f.size * 2, ..f }))
        })
        .unwrap();
    assert_eq!(updated.size, 20);

    // Upsert creates from the initial value, then mutates what is stored.
    let grown = |f: File| Ok(File { size: f.size + 1, ..f });
    let first = runner
        .run_in_transaction(|tx| {
            files
                .read_write(tx)
                .upsert("img/d", File::new("img/d", 5), grown)
        })
        .unwrap();
    assert_eq!(first.size, 6);
    let second = runner
        .run_in_transaction(|tx| {
            files
                .read_write(tx)
                .upsert("img/d", File::new("img/d", 5), grown)
        })
        .unwrap();
    assert_eq!(second.size, 7);

    // Filtered handles narrow reads only.
    let big = files.with("Size", 30_i64);
    assert_eq!(names(&big.read_only(&ctx), None), vec!["img/c"]);
    let err = runner
        .run_in_transaction(|tx| big.read_write(tx).get("docs/a"))
        .unwrap_err();
    assert!(is_not_found(&err));

    runner
        .run_in_transaction(|tx| files.read_write(tx).delete("docs/b"))
        .unwrap();
    let err = runner
        .run_in_transaction(|tx| files.read_write(tx).delete("docs/b"))
        .unwrap_err();
    assert!(is_not_found(&err));
    assert_eq!(names(&view, None), vec!["docs/a", "img/c", "img/d"]);

    runner
        .run_in_transaction(|tx| files.read_write(tx).delete_all())
        .unwrap();
    assert_eq!(view.count().unwrap(), 0);
}

#[test]
fn catalogue_on_sqlite() {
    let store = SqlStore::open_in_memory().unwrap();
    catalogue(store.collection::<File>().unwrap());
}

#[test]
fn catalogue_on_sqlite_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqlStore::open_path(dir.path().join("catalogue.db")).unwrap();
    catalogue(store.collection::<File>().unwrap());
}

#[test]
fn catalogue_in_memory() {
    let store = MemoryStore::default();
    catalogue(store.collection::<File>().unwrap());
}
