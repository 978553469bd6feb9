use mergesql::{
    CardinalityCheck, CteDefinition, Expr, JoinStrategy, MergeConfig, MergeSource,
    ReturningItem, SourceRelation,
};

use crate::assert_table_eq;
use crate::common::*;

#[test]
fn test_explain_describes_the_whole_plan() {
    let mut engine = scenario_engine();
    let stmt = scenario_a().returning(vec![
        ReturningItem::expr(t("id")),
        ReturningItem::aliased(Expr::MergeAction, "action"),
    ]);

    let text = engine.explain_merge(&stmt).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines,
        vec![
            "Merge into target as t",
            "  Source s (id INT64, v STRING): s0 (source)",
            "  On (t.id = s.id)",
            "  Join: hash on t.id = s.id",
            "  Cardinality: strict",
            "  [1] WHEN MATCHED THEN UPDATE SET v = s.v",
            "  [2] WHEN NOT MATCHED BY TARGET THEN INSERT (id, v) VALUES (s.id, s.v)",
            "  [3] WHEN NOT MATCHED BY SOURCE THEN DELETE",
            "  Returning t.id, merge_action() AS action",
        ]
    );
}

#[test]
fn test_explain_does_not_write() {
    let mut engine = scenario_engine();
    engine.explain_merge(&scenario_a()).unwrap();
    assert_table_eq!(sorted_scan(&mut engine, "target"), [[1, "a"], [2, "b"]]);
}

#[test]
fn test_explain_reports_strategy_and_cardinality_settings() {
    let mut engine = configured(
        scenario_engine(),
        MergeConfig::new()
            .with_join_strategy(JoinStrategy::NestedLoop)
            .with_cardinality(CardinalityCheck::PerSourceInput),
    );

    let text = engine.explain_merge(&scenario_a()).unwrap();

    assert!(text.contains("  Join: nested loop"), "{}", text);
    assert!(text.contains("  Cardinality: per_source_input"), "{}", text);
}

#[test]
fn test_explain_groups_clauses_and_flags_unreachable_ones() {
    let mut engine = scenario_engine();
    let stmt = merge_using(
        MergeSource::new("s", SourceRelation::cte("src")).with_input(SourceRelation::table("source")),
    )
    .with_cte(CteDefinition::new("src", SourceRelation::table("source")))
    .when_not_matched_insert(None, vec![], vec![s("id"), s("v")])
    .when_matched_delete(Some(s("v").eq(Expr::literal_string("B"))))
    .when_matched_do_nothing(None)
    .when_matched_update(None, vec![set("v", s("v"))]);

    let text = engine.explain_merge(&stmt).unwrap();

    assert!(text.contains(": s0 (cte src), s1 (source)"), "{}", text);
    assert!(text.contains("    CTE src = source"), "{}", text);
    assert!(text.contains("[2] WHEN MATCHED AND (s.v = 'B') THEN DELETE"), "{}", text);
    assert!(text.contains("[4] WHEN MATCHED THEN UPDATE SET v = s.v (unreachable)"), "{}", text);
    let matched = text.find("[2]").unwrap();
    let insert = text.find("[1]").unwrap();
    assert!(matched < insert, "{}", text);
}

#[test]
fn test_explain_reports_compile_errors() {
    let mut engine = scenario_engine();
    let stmt = merge_from_source_table().when_matched_update(None, vec![set("nope", s("v"))]);
    assert_error_contains(engine.explain_merge(&stmt), "does not exist in target");
}
