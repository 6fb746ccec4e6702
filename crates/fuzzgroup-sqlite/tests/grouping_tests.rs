//! Grouping engine running against the SQLite row store

use fuzzgroup_core::grouping::{EngineConfig, GroupingEngine, GroupingRequest};
use fuzzgroup_core::storage::RowStore;
use fuzzgroup_core::{CancelFlag, GroupError};
use fuzzgroup_sqlite::SqliteRowStore;
use pretty_assertions::assert_eq;

const CLIENTS: &str = "name,city\n\
Ivan Petrov,Omsk\n\
ivanpetrov,Tomsk\n\
Maria Ivanova,Kazan\n\
Oleg Sidorov,omsk\n";

fn group_ids(store: &SqliteRowStore) -> Vec<Option<i64>> {
    store
        .read_page(0, 100)
        .unwrap()
        .into_iter()
        .map(|r| r.group_id)
        .collect()
}

#[test]
fn test_group_by_one_column() {
    let mut store = SqliteRowStore::in_memory("fuzzy").unwrap();
    store.ingest(&[CLIENTS]).unwrap();

    let outcome = GroupingEngine::new()
        .run(&mut store, &GroupingRequest::new(["name"]), &CancelFlag::new())
        .unwrap();

    assert_eq!(outcome.groups().len(), 3);
    assert_eq!(group_ids(&store), vec![Some(1), Some(1), Some(2), Some(3)]);
}

#[test]
fn test_group_by_two_columns() {
    let mut store = SqliteRowStore::in_memory("fuzzy").unwrap();
    store.ingest(&[CLIENTS]).unwrap();

    GroupingEngine::new()
        .run(
            &mut store,
            &GroupingRequest::new(["name", "city"]),
            &CancelFlag::new(),
        )
        .unwrap();

    // "omsk" links Oleg to Ivan's group
    assert_eq!(group_ids(&store), vec![Some(1), Some(1), Some(2), Some(1)]);
}

#[test]
fn test_rerun_overwrites_group_ids() {
    let mut store = SqliteRowStore::in_memory("fuzzy").unwrap();
    store.ingest(&[CLIENTS]).unwrap();
    let engine = GroupingEngine::new();

    engine
        .run(&mut store, &GroupingRequest::new(["name", "city"]), &CancelFlag::new())
        .unwrap();
    engine
        .run(&mut store, &GroupingRequest::new(["name"]), &CancelFlag::new())
        .unwrap();

    assert_eq!(group_ids(&store), vec![Some(1), Some(1), Some(2), Some(3)]);
}

#[test]
fn test_unknown_column_leaves_table_untouched() {
    let mut store = SqliteRowStore::in_memory("fuzzy").unwrap();
    store.ingest(&[CLIENTS]).unwrap();

    let err = GroupingEngine::new()
        .run(&mut store, &GroupingRequest::new(["surname"]), &CancelFlag::new())
        .unwrap_err();

    assert!(matches!(err, GroupError::Schema(_)));
    assert!(group_ids(&store).iter().all(Option::is_none));
}

#[test]
fn test_group_before_ingest() {
    let mut store = SqliteRowStore::in_memory("fuzzy").unwrap();
    let err = GroupingEngine::new()
        .run(&mut store, &GroupingRequest::new(["name"]), &CancelFlag::new())
        .unwrap_err();
    assert!(matches!(err, GroupError::Schema(_)));
}

#[test]
fn test_index_hint_on_large_tables() {
    let mut store = SqliteRowStore::in_memory("fuzzy").unwrap();
    store.ingest(&[CLIENTS]).unwrap();

    let engine = GroupingEngine::with_config(EngineConfig {
        index_threshold: 1,
        ..Default::default()
    });
    engine
        .run(&mut store, &GroupingRequest::new(["name"]), &CancelFlag::new())
        .unwrap();

    let indexes: i64 = store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_fuzzy_name'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(indexes, 1);
}

#[test]
fn test_read_page_from_sqlite() {
    let mut store = SqliteRowStore::in_memory("fuzzy").unwrap();
    store.ingest(&[CLIENTS]).unwrap();

    let outcome = GroupingEngine::new()
        .run(&mut store, &GroupingRequest::new(["name"]), &CancelFlag::new())
        .unwrap();
    let page = outcome.read_page(&store, 1, 2).unwrap();

    assert_eq!(page.total, 4);
    assert_eq!(page.limit, 2);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].client_id, 2);
    assert_eq!(page.items[0].representative["name"], "Ivan Petrov");
    assert_eq!(page.items[0].values["city"], "Tomsk");
}
