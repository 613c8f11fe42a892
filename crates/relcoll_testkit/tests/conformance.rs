//! Both backends against the shared checks and the replay oracle.

use proptest::prelude::*;
use relcoll_core::{MemoryStore, SqlStore, StoreConfig};
use relcoll_testkit::prelude::*;

#[test]
fn sqlite_in_memory_conforms() {
    init_test_tracing();
    run_conformance(|| {
        SqlStore::open_in_memory()
            .unwrap()
            .collection::<FileRecord>()
            .unwrap()
    });
}

#[test]
fn sqlite_file_conforms() {
    init_test_tracing();
    let stores: std::cell::RefCell<Vec<TestSqlStore>> = Default::default();
    run_conformance(|| {
        let store = TestSqlStore::file_with(StoreConfig::new().max_idle_connections(1));
        let files = store.collection::<FileRecord>().unwrap();
        stores.borrow_mut().push(store);
        files
    });
}

#[test]
fn memory_conforms() {
    init_test_tracing();
    run_conformance(|| MemoryStore::default().collection::<FileRecord>().unwrap());
}

#[test]
fn backends_agree_on_a_fixed_history() {
    let ops = vec![
        FileOperation::Create(FileRecord::new("a/1", 1, "ann")),
        FileOperation::Put(FileRecord::new("a/2", 2, "bob")),
        FileOperation::Grow {
            name: "a/1".into(),
            delta: 5,
        },
        FileOperation::Delete {
            name: "a/2".into(),
        },
        FileOperation::Create(FileRecord::new("b_1", 3, "cat")),
    ];

    let mut sql = Harness::new(
        SqlStore::open_in_memory()
            .unwrap()
            .collection::<FileRecord>()
            .unwrap(),
    );
    let mut memory = Harness::new(MemoryStore::default().collection::<FileRecord>().unwrap());
    for op in &ops {
        assert_eq!(sql.apply(op), memory.apply(op));
    }
    sql.verify();
    memory.verify();
    assert_eq!(collection_json(sql.handle()), collection_json(memory.handle()));
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn sqlite_matches_oracle(
        ops in operation_sequence_strategy(1, 40),
        prefixes in prop::collection::vec(prefix_strategy(), 1..4),
    ) {
        let mut harness = Harness::new(
            SqlStore::open_in_memory()
                .unwrap()
                .collection::<FileRecord>()
                .unwrap(),
        );
        for op in &ops {
            harness.apply(op);
        }
        harness.verify();
        for prefix in &prefixes {
            harness.verify_prefix(prefix);
        }
    }

    #[test]
    fn memory_matches_oracle(
        ops in operation_sequence_strategy(1, 40),
        prefixes in prop::collection::vec(prefix_strategy(), 1..4),
    ) {
        let mut harness = Harness::new(MemoryStore::default().collection::<FileRecord>().unwrap());
        for op in &ops {
            harness.apply(op);
        }
        harness.verify();
        for prefix in &prefixes {
            harness.verify_prefix(prefix);
        }
    }
}
