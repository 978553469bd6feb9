use mergesql_ir::{Expr, MergeAction, MergeCategory, MergeStatement, PlanSchema, ReturningItem};

use super::catalog::MergeActionCatalog;
use super::join_predicates::EquiKey;
use super::types::SourceOrigin;
use crate::config::MergeConfig;

/// Everything the plan text reports, gathered by the executor's compile
/// step.
pub struct ExplainInput<'a> {
    pub stmt: &'a MergeStatement,
    pub source_schema: &'a PlanSchema,
    pub origins: &'a [SourceOrigin],
    pub keys: &'a [EquiKey],
    pub config: &'a MergeConfig,
    pub catalog: &'a MergeActionCatalog,
}

pub fn render_plan(input: &ExplainInput<'_>) -> String {
    let stmt = input.stmt;
    let mut lines = Vec::new();

    lines.push(match &stmt.target_alias {
        Some(alias) => format!("Merge into {} as {}", stmt.target, alias),
        None => format!("Merge into {}", stmt.target),
    });

    let columns: Vec<String> = input
        .source_schema
        .fields
        .iter()
        .map(|f| format!("{} {}", f.name, f.data_type))
        .collect();
    lines.push(format!(
        "  Source {} ({}): {}",
        stmt.source.alias,
        columns.join(", "),
        input
            .origins
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    for cte in &stmt.ctes {
        lines.push(format!("    CTE {} = {}", cte.name, cte.query.label()));
    }

    lines.push(format!("  On {}", stmt.on));
    let nested_loop = input.keys.is_empty()
        || input.config.join_strategy == crate::config::JoinStrategy::NestedLoop;
    lines.push(if nested_loop {
        "  Join: nested loop".to_string()
    } else {
        let keys: Vec<String> = input
            .keys
            .iter()
            .map(|k| format!("{} = {}", k.target, k.source))
            .collect();
        format!("  Join: hash on {}", keys.join(", "))
    });
    lines.push(format!("  Cardinality: {}", input.config.cardinality.as_str()));

    let unreachable: Vec<usize> = input
        .catalog
        .unreachable_clauses()
        .iter()
        .map(|c| c.ordinal)
        .collect();
    for category in MergeCategory::ALL {
        for compiled in input.catalog.clauses_for(category) {
            let Some(clause) = stmt.clauses.get(compiled.ordinal - 1) else {
                continue;
            };
            let mut line = format!("  [{}] WHEN {}", compiled.ordinal, category);
            if let Some(condition) = &clause.condition {
                line.push_str(&format!(" AND {}", condition));
            }
            line.push_str(&format!(" THEN {}", describe_action(&clause.action)));
            if unreachable.contains(&compiled.ordinal) {
                line.push_str(" (unreachable)");
            }
            lines.push(line);
        }
    }

    if let Some(items) = &stmt.returning {
        let items: Vec<String> = items
            .iter()
            .map(|item| match item {
                ReturningItem::AllTargetColumns => "*".to_string(),
                ReturningItem::Expr { expr, alias: None } => expr.to_string(),
                ReturningItem::Expr {
                    expr,
                    alias: Some(alias),
                } => format!("{} AS {}", expr, alias),
            })
            .collect();
        lines.push(format!("  Returning {}", items.join(", ")));
    }

    lines.join("\n")
}

fn describe_action(action: &MergeAction) -> String {
    match action {
        MergeAction::Update(set) => {
            let items: Vec<String> = set
                .iter()
                .map(|a| format!("{} = {}", a.column, a.value))
                .collect();
            format!("UPDATE SET {}", items.join(", "))
        }
        MergeAction::Delete => "DELETE".to_string(),
        MergeAction::Insert { columns, values } => {
            let values: Vec<String> = values.iter().map(Expr::to_string).collect();
            if columns.is_empty() {
                format!("INSERT VALUES ({})", values.join(", "))
            } else {
                format!("INSERT ({}) VALUES ({})", columns.join(", "), values.join(", "))
            }
        }
        MergeAction::DoNothing => "DO NOTHING".to_string(),
    }
}
