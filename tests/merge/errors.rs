use mergesql::{
    Assignment, Error, ErrorKind, Expr, MergeAction, MergeCategory, MergeSource, MergeStatement,
    WhenClause,
};

use crate::assert_table_eq;
use crate::common::*;

fn assert_untouched(engine: &mut mergesql::MergeEngine) {
    assert_table_eq!(sorted_scan(engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_insert_is_invalid_for_matched_rows() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table().when(WhenClause::new(
        MergeCategory::Matched,
        MergeAction::Insert {
            columns: vec![],
            values: vec![s("id"), s("v")],
        },
    ));

    let err = assert_error_kind(
        engine.execute_merge(&stmt),
        ErrorKind::InvalidClauseForCategory,
    );

    assert!(matches!(err, Error::InvalidClauseForCategory { .. }));
    assert_untouched(&mut engine);
}

#[test]
fn test_update_and_delete_are_invalid_for_unmatched_source_rows() {
    for action in [
        MergeAction::Update(vec![Assignment::new("v", s("v"))]),
        MergeAction::Delete,
    ] {
        let mut engine = scenario_engine();
        let stmt = scenario_a().when(WhenClause::new(MergeCategory::NotMatchedByTarget, action));
        assert_error_kind(
            engine.execute_merge(&stmt),
            ErrorKind::InvalidClauseForCategory,
        );
        assert_untouched(&mut engine);
    }
}

#[test]
fn test_clause_validation_precedes_table_lookup() {
    let mut engine = scenario_engine();
    let stmt = MergeStatement::new(
        "no_such_table",
        MergeSource::table("s", "source"),
        Expr::literal_bool(true),
    )
    .when(WhenClause::new(
        MergeCategory::NotMatchedBySource,
        MergeAction::Insert {
            columns: vec![],
            values: vec![],
        },
    ));

    assert_error_kind(
        engine.execute_merge(&stmt),
        ErrorKind::InvalidClauseForCategory,
    );
}

#[test]
fn test_unknown_tables_and_columns() {
    let mut engine = scenario_engine();
    let missing_target = MergeStatement::new(
        "no_such_table",
        MergeSource::table("s", "source"),
        Expr::literal_bool(true),
    );
    assert!(matches!(
        engine.execute_merge(&missing_target),
        Err(Error::TableNotFound(_))
    ));

    let missing_source = merge_using(MergeSource::table("s", "no_such_source"));
    assert!(matches!(
        engine.execute_merge(&missing_source),
        Err(Error::TableNotFound(_))
    ));

    let missing_column = merge_from_source_table()
        .when_matched_update(None, vec![set("v", s("nope"))]);
    assert!(matches!(
        engine.execute_merge(&missing_column),
        Err(Error::ColumnNotFound(_))
    ));
    assert_untouched(&mut engine);
}

#[test]
fn test_unqualified_shared_column_is_ambiguous() {
    let mut engine = scenario_engine();
    let stmt = MergeStatement::new(
        "target",
        MergeSource::table("s", "source"),
        Expr::column("id").eq(s("id")),
    )
    .alias("t");

    let err = engine.execute_merge(&stmt).unwrap_err();

    assert!(matches!(err, Error::AmbiguousColumn { .. }), "{}", err);
    assert!(err.to_string().contains("id"));
}

#[test]
fn test_category_scopes_restrict_column_references() {
    let mut engine = scenario_engine();
    let target_in_insert = merge_from_source_table().when_not_matched_insert(
        None,
        vec![],
        vec![s("id"), t("v")],
    );
    assert_error_contains(
        engine.execute_merge(&target_in_insert),
        "cannot reference target column",
    );

    let source_in_by_source = merge_from_source_table()
        .when_not_matched_by_source_update(None, vec![set("v", s("v"))]);
    assert_error_contains(
        engine.execute_merge(&source_in_by_source),
        "cannot reference source column",
    );

    let action_in_condition = merge_from_source_table()
        .when_matched_delete(Some(Expr::MergeAction.eq(Expr::literal_string("DELETED"))));
    assert_error_contains(
        engine.execute_merge(&action_in_condition),
        "merge_action() is not allowed",
    );
    assert_untouched(&mut engine);
}

#[test]
fn test_malformed_actions_fail_at_compile() {
    let mut engine = scenario_engine();

    let unknown_set = merge_from_source_table()
        .when_matched_update(None, vec![set("missing", s("v"))]);
    assert_error_contains(engine.execute_merge(&unknown_set), "does not exist in target");

    let duplicate_set = merge_from_source_table()
        .when_matched_update(None, vec![set("v", s("v")), set("v", t("v"))]);
    assert_error_contains(engine.execute_merge(&duplicate_set), "assigned more than once");

    let short_insert = merge_from_source_table()
        .when_not_matched_insert(None, vec!["id", "v"], vec![s("id")]);
    assert_error_contains(engine.execute_merge(&short_insert), "INSERT has 2 target columns");

    let empty_update = merge_from_source_table().when_matched_update(None, vec![]);
    assert_error_contains(
        engine.execute_merge(&empty_update),
        "requires at least one SET item",
    );
    assert_untouched(&mut engine);
}

#[test]
fn test_non_boolean_condition_is_a_type_mismatch() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table().when_matched_delete(Some(s("v")));

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::TypeMismatch);

    assert!(!err.is_retryable());
    assert_untouched(&mut engine);
}

#[test]
fn test_comparing_incompatible_types_is_a_type_mismatch() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table()
        .when_matched_delete(Some(s("v").eq(Expr::literal_i64(1))));

    assert_error_kind(engine.execute_merge(&stmt), ErrorKind::TypeMismatch);
    assert_untouched(&mut engine);
}

#[test]
fn test_constraint_failure_mid_statement_undoes_earlier_writes() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table()
        .when_matched_update(None, vec![set("v", s("v"))])
        .when_not_matched_insert(None, vec!["v"], vec![s("v")]);

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::EvaluationError);

    assert!(matches!(err, Error::NotNullViolation { .. }), "{}", err);
    assert_untouched(&mut engine);
}

#[test]
fn test_duplicate_key_from_update_is_rejected() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table().when_matched_update(None, vec![set("id", Expr::literal_i64(1))]);

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::EvaluationError);

    assert!(matches!(err, Error::UniqueConstraintViolation(_)), "{}", err);
    assert_untouched(&mut engine);
}

#[test]
fn test_division_by_zero_in_set_expression() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table().when_matched_update(
        None,
        vec![set(
            "id",
            s("id").binary(mergesql::BinaryOp::Div, Expr::literal_i64(0)),
        )],
    );

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::EvaluationError);

    assert_eq!(err, Error::DivisionByZero);
    assert_untouched(&mut engine);
}
