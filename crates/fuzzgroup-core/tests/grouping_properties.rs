//! Grouping engine properties and scenarios

use std::collections::BTreeSet;

use fuzzgroup_core::grouping::{EngineConfig, GroupingEngine, GroupingRequest};
use fuzzgroup_core::matcher::{edit_distance_match, key_match, rows_match, MatchConfig, RowKeys};
use fuzzgroup_core::normalize::{normalize, Key, NameTokens};
use fuzzgroup_core::row::{ColumnInfo, ColumnType, Value};
use fuzzgroup_core::storage::MemoryStore;
use fuzzgroup_core::{CancelFlag, GroupError, MatchReason};
use pretty_assertions::assert_eq;

/// Helper to build a single-column store of names
fn name_store(values: &[Option<&str>]) -> MemoryStore {
    let mut store = MemoryStore::new(vec![ColumnInfo::new("name", ColumnType::Text)]);
    for value in values {
        store.push_row(vec![Value::from(*value)]);
    }
    store
}

fn run(store: &mut MemoryStore, columns: &[&str]) -> fuzzgroup_core::GroupingOutcome {
    GroupingEngine::new()
        .run(store, &GroupingRequest::new(columns.iter().copied()), &CancelFlag::new())
        .unwrap()
}

fn group_ids(store: &MemoryStore, count: i64) -> Vec<Option<i64>> {
    (1..=count).map(|id| store.group_id(id)).collect()
}

const SAMPLES: &[&str] = &[
    "Ivan Petrov",
    "ivanpetrov",
    "Ivan-Petrov",
    "Maria Ivanova",
    "Мария Иванова",
    "smith",
    "smyth",
    "smithsonian",
    "",
    "ab",
    "Petrov Ivan Sergeevich",
    "Petrov Ivan S.",
    "Sidorov Ivan Sergeevich",
];

fn row_keys(raw: &str) -> RowKeys {
    RowKeys {
        keys: vec![Key::new(normalize(raw))],
        names: vec![NameTokens::from_raw(raw)],
    }
}

#[test]
fn test_normalization_is_idempotent() {
    for raw in SAMPLES {
        let once = normalize(raw);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn test_match_is_symmetric() {
    let config = MatchConfig::default();
    for a in SAMPLES {
        for b in SAMPLES {
            assert_eq!(
                rows_match(&row_keys(a), &row_keys(b), &config),
                rows_match(&row_keys(b), &row_keys(a), &config),
                "asymmetric for {:?} / {:?}",
                a,
                b
            );
        }
    }
}

#[test]
fn test_scenario_ivan_petrov() {
    let mut store = name_store(&[Some("Ivan Petrov"), Some("ivanpetrov"), Some("Maria Ivanova")]);
    let outcome = run(&mut store, &["name"]);

    assert_eq!(outcome.groups().len(), 2);
    assert_eq!(group_ids(&store, 3), vec![Some(1), Some(1), Some(2)]);
    assert_eq!(outcome.groups()[1].members, vec![3]);
}

#[test]
fn test_edit_distance_boundary() {
    let config = MatchConfig::default();
    let smith = Key::new(normalize("smith"));
    let smyth = Key::new(normalize("smyth"));
    let smithsonian = Key::new(normalize("smithsonian"));

    assert_eq!(edit_distance_match(&smith, &smyth, &config), Some(1));
    assert_eq!(edit_distance_match(&smith, &smithsonian, &config), None);
    assert_eq!(
        key_match(&smith, &smithsonian, &config),
        Some(MatchReason::Containment)
    );

    let mut store = name_store(&[Some("smith"), Some("smyth")]);
    let outcome = run(&mut store, &["name"]);
    assert_eq!(outcome.groups().len(), 1);
}

#[test]
fn test_chain_forms_one_group() {
    // abcdef-abcdxy and abcdxy-abwzxy are at distance 2; abcdef-abwzxy is at 4
    let mut store = name_store(&[
        Some("abcdef"),
        Some("zzzzzzzzzz"),
        Some("abcdxy"),
        Some("abwzxy"),
    ]);
    let config = MatchConfig::default();
    assert_eq!(rows_match(&row_keys("abcdef"), &row_keys("abwzxy"), &config), None);

    let outcome = run(&mut store, &["name"]);

    assert_eq!(group_ids(&store, 4), vec![Some(1), Some(2), Some(1), Some(1)]);
    assert_eq!(outcome.groups()[0].members, vec![1, 3, 4]);
    assert_eq!(outcome.groups()[1].members, vec![2]);
}

#[test]
fn test_group_ids_are_dense() {
    let mut store = name_store(&[
        Some("alpha"),
        Some("omega"),
        Some("alpha"),
        Some("kappa"),
        Some("sigma"),
        Some("omegga"),
    ]);
    let outcome = run(&mut store, &["name"]);

    let used: BTreeSet<i64> = outcome.assignments().iter().map(|&(_, g)| g).collect();
    let expected: BTreeSet<i64> = (1..=outcome.groups().len() as i64).collect();
    assert_eq!(used, expected);
    assert_eq!(outcome.stats().groups, outcome.groups().len());
}

#[test]
fn test_runs_are_deterministic() {
    let values = [
        Some("Ivan Petrov"),
        Some("Petrov Ivan"),
        Some("ivan petrov"),
        None,
        Some("Maria"),
        Some("Mariya"),
        Some("Marina"),
    ];
    let mut store = name_store(&values);

    let first = run(&mut store, &["name"]);
    let first_ids = group_ids(&store, values.len() as i64);
    let second = run(&mut store, &["name"]);
    let second_ids = group_ids(&store, values.len() as i64);

    assert_eq!(first_ids, second_ids);
    assert_eq!(first.groups(), second.groups());
}

#[test]
fn test_worker_count_does_not_change_results() {
    let values: Vec<String> = (0..200).map(|i| format!("client {}", i % 37)).collect();
    let mut sequential = name_store(&values.iter().map(|v| Some(v.as_str())).collect::<Vec<_>>());
    let mut parallel = name_store(&values.iter().map(|v| Some(v.as_str())).collect::<Vec<_>>());

    let request = GroupingRequest::new(["name"]);
    let one = GroupingEngine::with_config(EngineConfig {
        workers: 1,
        parallel_threshold: 0,
        ..Default::default()
    })
    .run(&mut sequential, &request, &CancelFlag::new())
    .unwrap();
    let many = GroupingEngine::with_config(EngineConfig {
        workers: 4,
        parallel_threshold: 0,
        ..Default::default()
    })
    .run(&mut parallel, &request, &CancelFlag::new())
    .unwrap();

    assert_eq!(one.assignments(), many.assignments());
    assert_eq!(one.groups(), many.groups());
}

#[test]
fn test_unknown_column_fails_before_scan() {
    let mut store = name_store(&[Some("a")]);
    let err = GroupingEngine::new()
        .run(
            &mut store,
            &GroupingRequest::new(["name", "surname"]),
            &CancelFlag::new(),
        )
        .unwrap_err();

    assert!(matches!(err, GroupError::Schema(_)));
    assert_eq!(store.scan_count(), 0);
}

#[test]
fn test_missing_table_is_schema_error() {
    let mut store = MemoryStore::without_table();
    let err = GroupingEngine::new()
        .run(&mut store, &GroupingRequest::new(["name"]), &CancelFlag::new())
        .unwrap_err();
    assert!(matches!(err, GroupError::Schema(_)));
}

#[test]
fn test_all_null_rows_form_one_group() {
    let mut store = MemoryStore::new(vec![
        ColumnInfo::new("name", ColumnType::Text),
        ColumnInfo::new("city", ColumnType::Text),
    ]);
    store.push_row(vec![Value::Null, Value::Null]);
    store.push_row(vec!["Johnathan".into(), "Springfield".into()]);
    store.push_row(vec![Value::Null, Value::Null]);
    store.push_row(vec![Value::Null, Value::Null]);

    let outcome = run(&mut store, &["name", "city"]);

    assert_eq!(outcome.groups().len(), 2);
    assert_eq!(group_ids(&store, 4), vec![Some(1), Some(2), Some(1), Some(1)]);
}

#[test]
fn test_any_column_links_rows() {
    let mut store = MemoryStore::new(vec![
        ColumnInfo::new("name", ColumnType::Text),
        ColumnInfo::new("city", ColumnType::Text),
    ]);
    store.push_row(vec!["Ivan".into(), "Novosibirsk".into()]);
    store.push_row(vec!["Oleg".into(), "novo sibirsk".into()]);

    run(&mut store, &["name"]);
    assert_eq!(group_ids(&store, 2), vec![Some(1), Some(2)]);

    run(&mut store, &["name", "city"]);
    assert_eq!(group_ids(&store, 2), vec![Some(1), Some(1)]);
}

#[test]
fn test_name_columns_link_by_tokens() {
    let mut store = name_store(&[
        Some("Petrov Ivan Sergeevich"),
        Some("Petrov Ivan S."),
        Some("Sidorov Ivan Sergeevich"),
    ]);
    let request = GroupingRequest::new(["name"]).with_name_columns(["name"]);
    let outcome = GroupingEngine::new()
        .run(&mut store, &request, &CancelFlag::new())
        .unwrap();

    assert_eq!(outcome.groups().len(), 2);
    assert_eq!(group_ids(&store, 3), vec![Some(1), Some(1), Some(2)]);
}

#[test]
fn test_cancelled_run_writes_nothing() {
    let mut store = name_store(&[Some("a"), Some("a")]);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = GroupingEngine::new()
        .run(&mut store, &GroupingRequest::new(["name"]), &cancel)
        .unwrap_err();

    assert!(matches!(err, GroupError::Cancelled));
    assert_eq!(group_ids(&store, 2), vec![None, None]);
}

#[test]
fn test_read_page_joins_representative() {
    let mut store = name_store(&[Some("Ivan Petrov"), Some("ivanpetrov"), Some("Maria Ivanova")]);
    let outcome = run(&mut store, &["name"]);

    let page = outcome.read_page(&store, 0, 100).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.groups, 2);
    assert_eq!(page.items.len(), 3);

    let second = &page.items[1];
    assert_eq!(second.client_id, 2);
    assert_eq!(second.group_id, Some(1));
    // "ivanpetrov" ties on key, row 1 wins on client_id
    assert_eq!(second.representative_id, Some(1));
    assert_eq!(second.representative["name"], "Ivan Petrov");
    assert_eq!(second.values["name"], "ivanpetrov");

    let tail = outcome.read_page(&store, 2, 100).unwrap();
    assert_eq!(tail.items.len(), 1);
    assert_eq!(tail.items[0].group_id, Some(2));
}
