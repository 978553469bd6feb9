use mergesql::{
    BinaryOp, CteDefinition, DataType, ErrorKind, Expr, MergeSource, PlanField, ScalarFunction,
    SourceQuery, SourceRelation,
};

use crate::assert_table_eq;
use crate::common::*;

fn kv_fields() -> Vec<PlanField> {
    vec![
        PlanField::new("id", DataType::Int64),
        PlanField::new("v", DataType::String),
    ]
}

fn values_row(id: i64, v: &str) -> Vec<Expr> {
    vec![Expr::literal_i64(id), Expr::literal_string(v)]
}

#[test]
fn test_table_and_values_inputs_form_one_source() {
    let mut engine = scenario_engine();
    let source = MergeSource::table("s", "source").with_input(SourceRelation::values(
        kv_fields(),
        vec![values_row(4, "d"), values_row(5, "e")],
    ));
    let stmt = merge_using(source)
        .when_matched_update(None, vec![set("v", s("v"))])
        .when_not_matched_insert(None, vec![], vec![s("id"), s("v")]);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.stats.inserted, 3);
    assert_eq!(outcome.stats.updated, 1);
    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "B"], [3, "c"], [4, "d"], [5, "e"]]
    );
}

#[test]
fn test_values_only_source() {
    let mut engine = scenario_engine();
    let stmt = merge_using(MergeSource::new(
        "s",
        SourceRelation::values(kv_fields(), vec![values_row(1, "z")]),
    ))
    .when_matched_delete(None);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "b"]]);
}

#[test]
fn test_subquery_source_filters_and_projects() {
    let mut engine = scenario_engine();
    let query = SourceQuery::from(SourceRelation::table("source"))
        .filter(Expr::column("id").gt(Expr::literal_i64(2)))
        .project(vec![
            (
                Expr::column("id").binary(BinaryOp::Add, Expr::literal_i64(10)),
                "id",
            ),
            (Expr::function(ScalarFunction::Upper, vec![Expr::column("v")]), "v"),
        ]);
    let stmt = merge_using(MergeSource::new("s", SourceRelation::query(query)))
        .when_not_matched_insert(None, vec![], vec![s("id"), s("v")]);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "b"], [13, "C"]]
    );
}

#[test]
fn test_cte_source() {
    let mut engine = scenario_engine();
    let recent = SourceRelation::query(
        SourceQuery::from(SourceRelation::table("source"))
            .filter(Expr::column("id").gt(Expr::literal_i64(2))),
    );
    let stmt = scenario_a();
    let stmt = mergesql::MergeStatement {
        source: MergeSource::new("s", SourceRelation::cte("recent")),
        ..stmt
    }
    .with_cte(CteDefinition::new("recent", recent));

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.stats.inserted, 1);
    assert_eq!(outcome.stats.deleted, 2);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[3, "c"]]);
}

#[test]
fn test_cte_name_shadows_table() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table()
        .with_cte(CteDefinition::new(
            "source",
            SourceRelation::values(kv_fields(), vec![values_row(9, "cte")]),
        ))
        .when_not_matched_insert(None, vec![], vec![s("id"), s("v")]);

    engine.execute_merge(&stmt).unwrap();

    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "b"], [9, "cte"]]
    );
}

#[test]
fn test_cte_column_list_renames_columns() {
    let mut engine = scenario_engine();
    let stmt = mergesql::MergeStatement::new(
        "target",
        MergeSource::new("s", SourceRelation::cte("renamed")),
        t("id").eq(s("key")),
    )
    .alias("t")
    .with_cte(
        CteDefinition::new("renamed", SourceRelation::table("source"))
            .with_columns(vec!["key".to_string(), "val".to_string()]),
    )
    .when_matched_update(None, vec![set("v", s("val"))]);

    engine.execute_merge(&stmt).unwrap();

    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "B"]]);
}

#[test]
fn test_cte_referenced_twice_reads_same_rows() {
    let mut engine = scenario_engine();
    let stmt = merge_using(
        MergeSource::new("s", SourceRelation::cte("src")).with_input(SourceRelation::cte("src")),
    )
    .with_cte(CteDefinition::new("src", SourceRelation::table("source")))
    .when_matched_update(None, vec![set("v", s("v"))]);

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::CardinalityViolation);

    assert!(err.to_string().contains("cte src"), "{}", err);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_recursive_cte_is_rejected() {
    let mut engine = scenario_engine();
    let stmt = merge_using(MergeSource::new("s", SourceRelation::cte("loop")))
        .with_cte(CteDefinition::new("loop", SourceRelation::cte("loop")))
        .when_matched_delete(None);

    assert_error_contains(engine.execute_merge(&stmt), "references itself");
}

#[test]
fn test_declared_column_list_renames_source() {
    let mut engine = scenario_engine();
    let source = MergeSource::table("s", "source").with_columns(vec![
        PlanField::new("key", DataType::Int64),
        PlanField::new("val", DataType::String),
    ]);
    let stmt = mergesql::MergeStatement::new("target", source, t("id").eq(s("key")))
        .alias("t")
        .when_not_matched_insert(None, vec![], vec![s("key"), s("val")]);

    engine.execute_merge(&stmt).unwrap();

    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "b"], [3, "c"]]
    );
}

#[test]
fn test_integer_source_widens_into_float_declaration() {
    let mut engine = engine_with_schema(
        mergesql::Schema::from_fields(vec![
            mergesql::Field::required("id", DataType::Float64),
            mergesql::Field::nullable("v", DataType::String),
        ]),
        &[("target", vec![vals![1.0, "a"]])],
    );
    let source = MergeSource::new(
        "s",
        SourceRelation::values(kv_fields(), vec![values_row(1, "x"), values_row(2, "y")]),
    )
    .with_columns(vec![
        PlanField::new("id", DataType::Float64),
        PlanField::new("v", DataType::String),
    ]);
    let stmt = merge_using(source)
        .when_matched_update(None, vec![set("v", s("v"))])
        .when_not_matched_insert(None, vec![], vec![s("id"), s("v")]);

    engine.execute_merge(&stmt).unwrap();

    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1.0, "x"], [2.0, "y"]]);
}

#[test]
fn test_misaligned_inputs_are_schema_mismatches() {
    let mut engine = scenario_engine();

    let narrow = MergeSource::table("s", "source").with_input(SourceRelation::values(
        vec![PlanField::new("id", DataType::Int64)],
        vec![vec![Expr::literal_i64(7)]],
    ));
    let err = assert_error_kind(
        engine.execute_merge(&merge_using(narrow).when_matched_delete(None)),
        ErrorKind::SchemaMismatch,
    );
    assert!(err.to_string().contains("s1"), "{}", err);

    let wrong_type = MergeSource::table("s", "source").with_columns(vec![
        PlanField::new("id", DataType::String),
        PlanField::new("v", DataType::String),
    ]);
    assert_error_kind(
        engine.execute_merge(&merge_using(wrong_type).when_matched_delete(None)),
        ErrorKind::SchemaMismatch,
    );

    let bad_values = MergeSource::new(
        "s",
        SourceRelation::values(
            kv_fields(),
            vec![vec![Expr::literal_string("x"), Expr::literal_string("y")]],
        ),
    );
    assert_error_kind(
        engine.execute_merge(&merge_using(bad_values).when_matched_delete(None)),
        ErrorKind::SchemaMismatch,
    );

    let cte_columns = merge_using(MergeSource::new("s", SourceRelation::cte("c")))
        .with_cte(
            CteDefinition::new("c", SourceRelation::table("source"))
                .with_columns(vec!["only_one".to_string()]),
        )
        .when_matched_delete(None);
    assert_error_kind(engine.execute_merge(&cte_columns), ErrorKind::SchemaMismatch);

    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_target_as_its_own_source_sees_pre_merge_rows() {
    let mut engine = scenario_engine();
    let shifted = SourceQuery::from(SourceRelation::table("target")).project(vec![
        (
            Expr::column("id").binary(BinaryOp::Add, Expr::literal_i64(1)),
            "id",
        ),
        (Expr::column("v"), "v"),
    ]);
    let stmt = merge_using(MergeSource::new("s", SourceRelation::query(shifted)))
        .when_matched_update(None, vec![set("v", s("v"))])
        .when_not_matched_insert(None, vec![], vec![s("id"), s("v")]);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.stats.updated, 1);
    assert_eq!(outcome.stats.inserted, 1);
    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "a"], [2, "a"], [3, "b"]]
    );
}
