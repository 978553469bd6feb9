use mergesql::{
    Error, ErrorKind, Expr, IsolationLevel, MergeSource, SourceRelation, Value,
};

use crate::assert_table_eq;
use crate::common::*;

fn bump_row_two() -> mergesql::MergeStatement {
    merge_using(MergeSource::new(
        "s",
        SourceRelation::values(
            vec![
                mergesql::PlanField::new("id", mergesql::DataType::Int64),
                mergesql::PlanField::new("v", mergesql::DataType::String),
            ],
            vec![
                vec![Expr::literal_i64(3), Expr::literal_string("c")],
                vec![Expr::literal_i64(2), Expr::literal_string("mine")],
            ],
        ),
    ))
    .when_matched_update(None, vec![set("v", s("v"))])
    .when_not_matched_insert(None, vec![], vec![s("id"), s("v")])
}

#[test]
fn test_uncommitted_merge_is_invisible_to_other_sessions() {
    let mut engine = scenario_engine();
    let mut other = engine.create_session();

    engine.begin().unwrap();
    engine.execute_merge(&scenario_a()).unwrap();

    assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "B"], [3, "c"]]);
    assert_table_eq!(
        other.scan_table("target").unwrap().sorted(),
        [[1, "a"], [2, "b"]]
    );

    engine.commit().unwrap();
    assert_table_eq!(
        other.scan_table("target").unwrap().sorted(),
        [[2, "B"], [3, "c"]]
    );
}

#[test]
fn test_rollback_discards_the_whole_merge() {
    let mut engine = scenario_engine();

    engine.begin().unwrap();
    let outcome = engine.execute_merge(&scenario_a()).unwrap();
    assert_eq!(outcome.rows_affected, 3);
    engine.rollback().unwrap();

    assert!(!engine.in_transaction());
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_concurrent_writer_conflict_fails_whole_statement() {
    let mut engine = scenario_engine();
    let mut other = engine.create_session();

    engine.begin().unwrap();
    engine
        .execute_merge(&merge_from_source_table().when_matched_update(None, vec![set("v", s("v"))]))
        .unwrap();

    let err = assert_error_kind(
        other.execute_merge(&bump_row_two()),
        ErrorKind::ConcurrentUpdateConflict,
    );
    assert!(err.is_retryable());
    assert!(!err.is_data_integrity());
    assert!(err.to_string().contains("id=2"), "{}", err);

    engine.commit().unwrap();
    assert_table_eq!(
        other.scan_table("target").unwrap().sorted(),
        [[1, "a"], [2, "B"]]
    );
}

#[test]
fn test_commit_after_snapshot_conflicts_under_repeatable_read() {
    let mut engine = scenario_engine();
    let mut other = engine.create_session();

    other
        .begin_with_isolation(IsolationLevel::RepeatableRead)
        .unwrap();
    other.scan_table("target").unwrap();

    engine
        .execute_merge(&merge_from_source_table().when_matched_update(None, vec![set("v", s("v"))]))
        .unwrap();

    assert_error_kind(
        other.execute_merge(&bump_row_two()),
        ErrorKind::ConcurrentUpdateConflict,
    );
    assert!(matches!(
        other.commit(),
        Err(Error::TransactionAborted { .. })
    ));
    assert!(!other.in_transaction());
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "B"]]);
}

#[test]
fn test_read_committed_sees_commits_between_statements() {
    let mut engine = scenario_engine();
    let mut other = engine.create_session();

    other.begin().unwrap();
    other.scan_table("target").unwrap();

    engine
        .execute_merge(&merge_from_source_table().when_matched_update(None, vec![set("v", s("v"))]))
        .unwrap();

    let outcome = other.execute_merge(&bump_row_two()).unwrap();
    assert_eq!(outcome.rows_affected, 2);
    other.commit().unwrap();

    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "mine"], [3, "c"]]
    );
}

#[test]
fn test_retry_after_conflict_succeeds() {
    let mut engine = scenario_engine();
    let mut other = engine.create_session();

    engine.begin().unwrap();
    engine
        .execute_merge(&merge_from_source_table().when_matched_delete(None))
        .unwrap();

    let err = other.execute_merge(&bump_row_two()).unwrap_err();
    assert!(err.is_retryable());

    engine.commit().unwrap();
    let outcome = other.execute_merge(&bump_row_two()).unwrap();

    assert_eq!(outcome.stats.inserted, 2);
    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "mine"], [3, "c"]]
    );
}

#[test]
fn test_concurrent_inserts_of_one_key_cannot_both_commit() {
    let mut engine = scenario_engine();
    let mut other = engine.create_session();
    let insert_five = || {
        merge_using(MergeSource::new(
            "s",
            SourceRelation::values(
                vec![
                    mergesql::PlanField::new("id", mergesql::DataType::Int64),
                    mergesql::PlanField::new("v", mergesql::DataType::String),
                ],
                vec![vec![Expr::literal_i64(5), Expr::literal_string("e")]],
            ),
        ))
        .when_not_matched_insert(None, vec![], vec![s("id"), s("v")])
    };

    engine.begin().unwrap();
    other.begin().unwrap();
    assert_eq!(engine.execute_merge(&insert_five()).unwrap().rows_affected, 1);

    let err = assert_error_kind(
        other.execute_merge(&insert_five()),
        ErrorKind::ConcurrentUpdateConflict,
    );
    assert!(err.to_string().contains("id=5"), "{}", err);

    engine.commit().unwrap();
    assert!(matches!(
        other.commit(),
        Err(Error::TransactionAborted { .. })
    ));
    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "b"], [5, "e"]]
    );
}

#[test]
fn test_failed_merge_aborts_explicit_transaction() {
    let mut engine = scenario_engine();

    engine.begin().unwrap();
    engine
        .insert_rows("target", vec![vec![Value::int64(9), Value::string("z")]])
        .unwrap();
    assert!(engine
        .execute_merge(&merge_from_source_table().when_matched_delete(Some(s("v"))))
        .is_err());

    assert!(matches!(
        engine.execute_merge(&scenario_a()),
        Err(Error::TransactionAborted { .. })
    ));
    assert!(matches!(
        engine.scan_table("target"),
        Err(Error::TransactionAborted { .. })
    ));

    engine.rollback().unwrap();
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_savepoint_recovers_from_failed_merge() {
    let mut engine = scenario_engine();

    engine.begin().unwrap();
    engine
        .insert_rows("target", vec![vec![Value::int64(9), Value::string("z")]])
        .unwrap();
    engine.savepoint("before_merge").unwrap();
    engine
        .execute_merge(&merge_from_source_table().when_matched_update(None, vec![set("v", s("v"))]))
        .unwrap();
    assert!(engine
        .execute_merge(&merge_from_source_table().when_matched_update(
            None,
            vec![set("id", Expr::literal_i64(1))],
        ))
        .is_err());

    engine.rollback_to_savepoint("before_merge").unwrap();
    engine.execute_merge(&scenario_a()).unwrap();
    engine.commit().unwrap();

    assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "B"], [3, "c"]]);
}

#[test]
fn test_unknown_savepoint() {
    let mut engine = scenario_engine();
    engine.begin().unwrap();

    assert!(matches!(
        engine.rollback_to_savepoint("nope"),
        Err(Error::SavepointNotFound { .. })
    ));
}

#[test]
fn test_vacuum_keeps_rows_visible() {
    let mut engine = scenario_engine();
    engine.execute_merge(&scenario_a()).unwrap();

    assert!(engine.vacuum() > 0);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "B"], [3, "c"]]);
}
