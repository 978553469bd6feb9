use mergesql::{
    BinaryOp, DataType, ErrorKind, Expr, MergeConfig, MutationKind, ReturningItem,
    ScalarFunction,
};

use crate::assert_table_eq;
use crate::common::*;

#[test]
fn test_scenario_d_returning_in_application_order() {
    let mut engine = scenario_engine();
    let stmt = scenario_a().returning(vec![
        ReturningItem::expr(t("id")),
        ReturningItem::aliased(Expr::MergeAction, "action"),
    ]);

    let outcome = engine.execute_merge(&stmt).unwrap();
    let returning = outcome.returning.unwrap();

    assert_eq!(returning.len(), outcome.rows_affected);
    assert_eq!(
        returning.actions(),
        vec![
            MutationKind::Updated,
            MutationKind::Inserted,
            MutationKind::Deleted
        ]
    );
    let table = returning.into_table().unwrap();
    assert_eq!(
        table
            .schema()
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>(),
        vec!["id", "action"]
    );
    assert_table_eq!(table, [[2, "UPDATED"], [3, "INSERTED"], [1, "DELETED"]]);
}

#[test]
fn test_returning_star_uses_final_and_pre_delete_values() {
    let mut engine = scenario_engine();
    let stmt = scenario_a().returning(vec![ReturningItem::AllTargetColumns]);

    let returning = engine.execute_merge(&stmt).unwrap().returning.unwrap();
    let table = returning.into_table().unwrap();

    assert_eq!(table.schema().field_count(), 2);
    assert_table_eq!(table, [[2, "B"], [3, "c"], [1, "a"]]);
}

#[test]
fn test_returning_source_columns_and_expressions() {
    let mut engine = scenario_engine();
    let stmt = scenario_a().returning(vec![
        ReturningItem::expr(s("v")),
        ReturningItem::expr(t("id").binary(BinaryOp::Mul, Expr::literal_i64(10))),
        ReturningItem::expr(Expr::function(
            ScalarFunction::Lower,
            vec![Expr::MergeAction],
        )),
    ]);

    let returning = engine.execute_merge(&stmt).unwrap().returning.unwrap();

    let names: Vec<&str> = returning
        .schema()
        .fields()
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["v", "?column?", "?column?"]);
    assert_eq!(returning.schema().fields()[1].data_type, DataType::Int64);
    assert_table_eq!(
        returning.into_table().unwrap(),
        [["B", 20, "updated"], ["c", 30, "inserted"], [null, 10, "deleted"]]
    );
}

#[test]
fn test_returning_bare_merge_action_column_name() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table()
        .when_matched_delete(None)
        .returning(vec![ReturningItem::expr(Expr::MergeAction)]);

    let returning = engine.execute_merge(&stmt).unwrap().returning.unwrap();

    assert_eq!(returning.schema().fields()[0].name, "merge_action");
    assert_eq!(
        returning.rows()[0].get(0),
        Some(&mergesql::Value::string("DELETED"))
    );
}

#[test]
fn test_returning_is_empty_when_nothing_applies() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table()
        .when_matched_do_nothing(None)
        .returning(vec![ReturningItem::AllTargetColumns]);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.rows_affected, 0);
    assert!(outcome.returning.unwrap().is_empty());
}

#[test]
fn test_no_returning_clause_yields_none() {
    let mut engine = scenario_engine();
    let outcome = engine.execute_merge(&scenario_a()).unwrap();
    assert!(outcome.returning.is_none());
}

#[test]
fn test_returning_limit_fails_statement() {
    let mut engine = configured(
        scenario_engine(),
        MergeConfig::new().with_max_returning_rows(2).unwrap(),
    );
    let stmt = scenario_a().returning(vec![ReturningItem::AllTargetColumns]);

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::Other);

    assert!(err.to_string().contains("limit of 2 rows"), "{}", err);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_returning_limit_not_hit() {
    let mut engine = configured(
        scenario_engine(),
        MergeConfig::new().with_max_returning_rows(3).unwrap(),
    );
    let stmt = scenario_a().returning(vec![ReturningItem::AllTargetColumns]);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.returning.unwrap().len(), 3);
}

#[test]
fn test_invalid_returning_fails_before_writing() {
    let mut engine = scenario_engine();
    let stmt = scenario_a().returning(vec![ReturningItem::expr(t("missing"))]);

    assert!(engine.execute_merge(&stmt).is_err());
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}
