use mergesql_common::error::Result;
use mergesql_storage::Record;

use super::catalog::{BoundAction, CompiledClause};
use crate::ir_evaluator::IrEvaluator;

/// Outcome of scanning one category's clauses for a joined row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'c> {
    Apply(&'c CompiledClause),
    /// The first satisfied clause was `DO NOTHING`.
    DoNothing(&'c CompiledClause),
    NoMatch,
}

/// First-match-wins: the first clause, in declared order, whose condition
/// holds (or that has none) decides the action. Later clauses are not
/// evaluated.
pub fn select_action<'c>(
    clauses: &'c [CompiledClause],
    evaluator: &IrEvaluator<'_>,
    joined: &Record,
) -> Result<Selection<'c>> {
    for clause in clauses {
        let satisfied = match &clause.condition {
            Some(condition) => evaluator.evaluate_bool(condition, joined)?,
            None => true,
        };
        if satisfied {
            return Ok(match clause.action {
                BoundAction::DoNothing => Selection::DoNothing(clause),
                _ => Selection::Apply(clause),
            });
        }
    }
    Ok(Selection::NoMatch)
}
