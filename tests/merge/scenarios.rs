use mergesql::{
    BinaryOp, CardinalityCheck, DataType, ErrorKind, Expr, Field, JoinStrategy, MergeConfig,
    MergeEngine, MergeSource, PlanField, Schema, SourceRelation,
};

use crate::assert_table_eq;
use crate::common::*;

#[test]
fn test_scenario_a_three_way_merge() {
    for strategy in [JoinStrategy::Auto, JoinStrategy::Hash, JoinStrategy::NestedLoop] {
        let mut engine = configured(
            scenario_engine(),
            MergeConfig::new().with_join_strategy(strategy),
        );

        let outcome = engine.execute_merge(&scenario_a()).unwrap();

        assert_eq!(outcome.rows_affected, 3, "{:?}", strategy);
        assert_eq!(outcome.stats.updated, 1);
        assert_eq!(outcome.stats.inserted, 1);
        assert_eq!(outcome.stats.deleted, 1);
        assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "B"], [3, "c"]]);
    }
}

#[test]
fn test_scenario_b_condition_checked_before_fallback() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table()
        .when_matched_update(
            Some(s("v").not_eq(t("v"))),
            vec![set("v", s("v"))],
        )
        .when_matched_do_nothing(None);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.stats.updated, 1);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "B"]]);
}

#[test]
fn test_scenario_b_fallback_when_condition_fails() {
    let mut engine = engine_with(&[
        ("target", vec![kv_row(1, "a"), kv_row(2, "b")]),
        ("source", vec![kv_row(2, "b")]),
    ]);
    let stmt = merge_from_source_table()
        .when_matched_update(
            Some(s("v").not_eq(t("v"))),
            vec![set("v", Expr::literal_string("changed"))],
        )
        .when_matched_do_nothing(None);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.rows_affected, 0);
    assert_eq!(outcome.stats.skipped, 1);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_scenario_c_two_sources_matching_one_row() {
    let mut engine = engine_with(&[
        ("target", vec![kv_row(2, "b")]),
        ("source_a", vec![kv_row(2, "from a")]),
        ("source_b", vec![kv_row(2, "from b")]),
    ]);
    let stmt = merge_using(
        MergeSource::table("s", "source_a").with_input(SourceRelation::table("source_b")),
    )
    .when_matched_update(None, vec![set("v", s("v"))]);

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::CardinalityViolation);

    assert!(err.is_data_integrity());
    assert!(!err.is_retryable());
    let message = err.to_string();
    assert!(message.contains("id=2"), "{}", message);
    assert!(message.contains("source_a"), "{}", message);
    assert!(message.contains("source_b"), "{}", message);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "b"]]);
}

#[test]
fn test_duplicate_rows_in_one_source_violate_cardinality() {
    for cardinality in [CardinalityCheck::Strict, CardinalityCheck::PerSourceInput] {
        let mut engine = configured(
            engine_with(&[("target", vec![kv_row(1, "a")])]),
            MergeConfig::new().with_cardinality(cardinality),
        );
        engine.create_table("source", unkeyed_schema()).unwrap();
        engine
            .insert_rows("source", vec![kv_row(1, "x"), kv_row(1, "y")])
            .unwrap();
        let stmt = merge_from_source_table().when_matched_update(None, vec![set("v", s("v"))]);

        assert_error_kind(engine.execute_merge(&stmt), ErrorKind::CardinalityViolation);
        assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"]]);
    }
}

#[test]
fn test_per_source_input_allows_one_match_per_input() {
    let mut engine = configured(
        engine_with(&[
            ("target", vec![kv_row(1, "a"), kv_row(2, "b")]),
            ("source_a", vec![kv_row(1, "from a")]),
            ("source_b", vec![kv_row(2, "from b")]),
        ]),
        MergeConfig::new().with_cardinality(CardinalityCheck::PerSourceInput),
    );
    let stmt = merge_using(
        MergeSource::table("s", "source_a").with_input(SourceRelation::table("source_b")),
    )
    .when_matched_update(None, vec![set("v", s("v"))]);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.rows_affected, 2);
    assert_table_eq!(
        sorted_scan(&mut engine, "target"),
        [[1, "from a"], [2, "from b"]]
    );
}

#[test]
fn test_per_source_input_double_match_rejected_on_second_write() {
    let mut engine = configured(
        engine_with(&[
            ("target", vec![kv_row(2, "b")]),
            ("source_a", vec![kv_row(2, "from a")]),
            ("source_b", vec![kv_row(2, "from b")]),
        ]),
        MergeConfig::new().with_cardinality(CardinalityCheck::PerSourceInput),
    );
    let stmt = merge_using(
        MergeSource::table("s", "source_a").with_input(SourceRelation::table("source_b")),
    )
    .when_matched_update(None, vec![set("v", s("v"))]);

    let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::DoubleMatchViolation);

    assert!(err.is_data_integrity());
    assert!(err.to_string().contains("id=2"));
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "b"]]);
}

#[test]
fn test_per_source_input_second_match_may_do_nothing() {
    let mut engine = configured(
        engine_with(&[
            ("target", vec![kv_row(2, "b")]),
            ("source_a", vec![kv_row(2, "from a")]),
            ("source_b", vec![kv_row(2, "from b")]),
        ]),
        MergeConfig::new().with_cardinality(CardinalityCheck::PerSourceInput),
    );
    let stmt = merge_using(
        MergeSource::table("s", "source_a").with_input(SourceRelation::table("source_b")),
    )
    .when_matched_update(
        Some(s("v").eq(Expr::literal_string("from a"))),
        vec![set("v", s("v"))],
    )
    .when_matched_do_nothing(None);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.stats.matched, 2);
    assert_eq!(outcome.stats.skipped, 1);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[2, "from a"]]);
}

#[test]
fn test_every_row_lands_in_exactly_one_category() {
    let targets: Vec<_> = (1..=10).map(|i| kv_row(i, "t")).collect();
    let sources: Vec<_> = (5..=15).map(|i| kv_row(i, "s")).collect();

    for strategy in [JoinStrategy::Hash, JoinStrategy::NestedLoop] {
        let mut engine = configured(
            engine_with(&[("target", targets.clone()), ("source", sources.clone())]),
            MergeConfig::new().with_join_strategy(strategy),
        );
        let stmt = merge_from_source_table()
            .when_matched_do_nothing(None)
            .when(mergesql::WhenClause::new(
                mergesql::MergeCategory::NotMatchedByTarget,
                mergesql::MergeAction::DoNothing,
            ))
            .when(mergesql::WhenClause::new(
                mergesql::MergeCategory::NotMatchedBySource,
                mergesql::MergeAction::DoNothing,
            ));

        let outcome = engine.execute_merge(&stmt).unwrap();

        assert_eq!(outcome.stats.matched, 6);
        assert_eq!(outcome.stats.not_matched_by_target, 5);
        assert_eq!(outcome.stats.not_matched_by_source, 4);
        assert_eq!(outcome.stats.matched + outcome.stats.not_matched_by_source, 10);
        assert_eq!(outcome.stats.matched + outcome.stats.not_matched_by_target, 11);
        assert_eq!(outcome.rows_affected, 0);
    }
}

#[test]
fn test_theta_join_classifies_by_full_condition() {
    let mut engine = engine_with(&[
        ("target", vec![kv_row(1, "a"), kv_row(10, "b")]),
        ("source", vec![kv_row(3, "x"), kv_row(20, "y")]),
    ]);
    let within_five = t("id")
        .binary(BinaryOp::Sub, s("id"))
        .lt(Expr::literal_i64(5))
        .and(s("id").binary(BinaryOp::Sub, t("id")).lt(Expr::literal_i64(5)));
    let stmt = mergesql::MergeStatement::new(
        "target",
        MergeSource::table("s", "source"),
        within_five,
    )
    .alias("t")
    .when_matched_update(None, vec![set("v", s("v"))])
    .when_not_matched_insert(None, vec![], vec![s("id"), s("v")])
    .when_not_matched_by_source_delete(None);

    let outcome = engine.execute_merge(&stmt).unwrap();

    assert_eq!(outcome.stats.matched, 1);
    assert_eq!(outcome.stats.not_matched_by_target, 1);
    assert_eq!(outcome.stats.not_matched_by_source, 1);
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "x"], [20, "y"]]);
}

#[test]
fn test_null_join_keys_never_match() {
    let schema = unkeyed_schema();
    for strategy in [JoinStrategy::Hash, JoinStrategy::NestedLoop] {
        let mut engine = configured(
            engine_with_schema(
                schema.clone(),
                &[
                    ("target", vec![vals![null, "t"]]),
                    ("source", vec![vals![null, "s"]]),
                ],
            ),
            MergeConfig::new().with_join_strategy(strategy),
        );
        let stmt = merge_from_source_table()
            .when_matched_update(None, vec![set("v", Expr::literal_string("matched"))])
            .when_not_matched_insert(None, vec![], vec![s("id"), s("v")]);

        let outcome = engine.execute_merge(&stmt).unwrap();

        assert_eq!(outcome.stats.matched, 0);
        assert_eq!(outcome.stats.not_matched_by_target, 1);
        assert_eq!(outcome.stats.not_matched_by_source, 1);
        assert_table_eq!(sorted_scan(&mut engine, "target"), [[null, "s"], [null, "t"]]);
    }
}

#[test]
fn test_empty_source_only_sees_unmatched_targets() {
    let mut engine = engine_with(&[
        ("target", vec![kv_row(1, "a"), kv_row(2, "b")]),
        ("source", vec![]),
    ]);

    let outcome = engine.execute_merge(&scenario_a()).unwrap();

    assert_eq!(outcome.stats.not_matched_by_source, 2);
    assert_eq!(outcome.rows_affected, 2);
    assert_table_eq!(sorted_scan(&mut engine, "target"), []);
}

#[test]
fn test_incomparable_join_keys_fail_under_every_strategy() {
    for strategy in [JoinStrategy::Auto, JoinStrategy::Hash, JoinStrategy::NestedLoop] {
        let mut engine = configured(
            scenario_engine(),
            MergeConfig::new().with_join_strategy(strategy),
        );
        let source = MergeSource::new(
            "s",
            SourceRelation::values(
                vec![PlanField::new("id", DataType::String)],
                vec![vec![Expr::literal_string("1")]],
            ),
        );
        let stmt = merge_using(source).when_not_matched_by_source_delete(None);

        let err = assert_error_kind(engine.execute_merge(&stmt), ErrorKind::TypeMismatch);

        assert!(err.to_string().contains("STRING"), "{:?}: {}", strategy, err);
        assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
    }
}

#[test]
fn test_numeric_and_float_keys_match_under_every_strategy() {
    for strategy in [JoinStrategy::Auto, JoinStrategy::Hash, JoinStrategy::NestedLoop] {
        let mut engine =
            MergeEngine::new().with_config(MergeConfig::new().with_join_strategy(strategy));
        let keyed = |id_type: DataType| {
            Schema::from_fields(vec![
                Field::required("id", id_type),
                Field::nullable("v", DataType::String),
            ])
        };
        engine.create_table("target", keyed(DataType::Numeric)).unwrap();
        engine.create_table("source", keyed(DataType::Float64)).unwrap();
        engine
            .insert_rows("target", vec![vec![numeric("100000000000000000000"), str("a")]])
            .unwrap();
        engine
            .insert_rows("source", vec![vec![f64(1e20), str("B")]])
            .unwrap();

        assert!(
            engine
                .explain_merge(&scenario_a())
                .unwrap()
                .contains("Join: nested loop")
        );
        let outcome = engine.execute_merge(&scenario_a()).unwrap();

        assert_eq!(outcome.stats.matched, 1, "{:?}", strategy);
        assert_eq!(outcome.stats.deleted, 0, "{:?}", strategy);
        assert_eq!(
            committed(&engine, "target"),
            vec![vec![numeric("100000000000000000000"), str("B")]]
        );
    }
}
