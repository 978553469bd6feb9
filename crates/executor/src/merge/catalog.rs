use std::collections::HashSet;

use debug_print::debug_eprintln;
use mergesql_common::error::{Error, Result};
use mergesql_ir::{Assignment, Expr, MergeAction, MergeCategory, WhenClause};
use mergesql_storage::Schema;

use super::binding::{BindScope, JoinedLayout};

#[derive(Debug, Clone, PartialEq)]
pub enum BoundAction {
    /// Target column index and the bound value expression.
    Update { assignments: Vec<(usize, Expr)> },
    Delete,
    /// One expression per target column, NULL for columns not listed.
    Insert { values: Vec<Expr> },
    DoNothing,
}

impl BoundAction {
    pub fn name(&self) -> &'static str {
        match self {
            BoundAction::Update { .. } => "UPDATE",
            BoundAction::Delete => "DELETE",
            BoundAction::Insert { .. } => "INSERT",
            BoundAction::DoNothing => "DO NOTHING",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledClause {
    /// Position of the clause in the statement, starting at 1.
    pub ordinal: usize,
    pub category: MergeCategory,
    pub condition: Option<Expr>,
    pub action: BoundAction,
}

/// The statement's WHEN clauses, validated, bound and grouped by category
/// with their declared order preserved.
#[derive(Debug, Clone, Default)]
pub struct MergeActionCatalog {
    matched: Vec<CompiledClause>,
    not_matched_by_target: Vec<CompiledClause>,
    not_matched_by_source: Vec<CompiledClause>,
}

impl MergeActionCatalog {
    /// Rejects action kinds that cannot run in their clause's category.
    pub fn validate(clauses: &[WhenClause]) -> Result<()> {
        for clause in clauses {
            let allowed = match clause.category {
                MergeCategory::NotMatchedByTarget => {
                    matches!(
                        clause.action,
                        MergeAction::Insert { .. } | MergeAction::DoNothing
                    )
                }
                MergeCategory::Matched | MergeCategory::NotMatchedBySource => matches!(
                    clause.action,
                    MergeAction::Update(_) | MergeAction::Delete | MergeAction::DoNothing
                ),
            };
            if !allowed {
                return Err(Error::InvalidClauseForCategory {
                    category: clause.category.to_string(),
                    action: clause.action.name().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn compile(
        clauses: &[WhenClause],
        target_name: &str,
        target_schema: &Schema,
        layout: &JoinedLayout,
    ) -> Result<Self> {
        Self::validate(clauses)?;

        let mut catalog = Self::default();
        for (idx, clause) in clauses.iter().enumerate() {
            let scope = BindScope::for_category(clause.category);
            let condition = clause
                .condition
                .as_ref()
                .map(|c| layout.bind(c, scope))
                .transpose()?;
            let action = match &clause.action {
                MergeAction::Update(set) => BoundAction::Update {
                    assignments: bind_assignments(set, target_name, target_schema, layout, scope)?,
                },
                MergeAction::Delete => BoundAction::Delete,
                MergeAction::Insert { columns, values } => BoundAction::Insert {
                    values: bind_insert(columns, values, target_name, target_schema, layout, scope)?,
                },
                MergeAction::DoNothing => BoundAction::DoNothing,
            };

            catalog.clauses_mut(clause.category).push(CompiledClause {
                ordinal: idx + 1,
                category: clause.category,
                condition,
                action,
            });
        }

        debug_eprintln!(
            "[executor::merge::catalog] compiled {} clauses: matched={}, not_matched_by_target={}, not_matched_by_source={}",
            clauses.len(),
            catalog.matched.len(),
            catalog.not_matched_by_target.len(),
            catalog.not_matched_by_source.len()
        );
        for clause in catalog.unreachable_clauses() {
            debug_eprintln!(
                "[executor::merge::catalog] clause {} (WHEN {} THEN {}) is unreachable",
                clause.ordinal,
                clause.category,
                clause.action.name()
            );
        }

        Ok(catalog)
    }

    pub fn clauses_for(&self, category: MergeCategory) -> &[CompiledClause] {
        match category {
            MergeCategory::Matched => &self.matched,
            MergeCategory::NotMatchedByTarget => &self.not_matched_by_target,
            MergeCategory::NotMatchedBySource => &self.not_matched_by_source,
        }
    }

    fn clauses_mut(&mut self, category: MergeCategory) -> &mut Vec<CompiledClause> {
        match category {
            MergeCategory::Matched => &mut self.matched,
            MergeCategory::NotMatchedByTarget => &mut self.not_matched_by_target,
            MergeCategory::NotMatchedBySource => &mut self.not_matched_by_source,
        }
    }

    pub fn len(&self) -> usize {
        self.matched.len() + self.not_matched_by_target.len() + self.not_matched_by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clauses that follow an unconditional clause of the same category and
    /// so can never be selected.
    pub fn unreachable_clauses(&self) -> Vec<&CompiledClause> {
        MergeCategory::ALL
            .iter()
            .flat_map(|category| {
                let clauses = self.clauses_for(*category);
                let first_unconditional = clauses.iter().position(|c| c.condition.is_none());
                match first_unconditional {
                    Some(pos) => &clauses[pos + 1..],
                    None => &clauses[..0],
                }
            })
            .collect()
    }
}

fn target_column_index(
    column: &str,
    target_name: &str,
    target_schema: &Schema,
) -> Result<usize> {
    let name = match column.split_once('.') {
        Some((qualifier, name)) => {
            if !qualifier.eq_ignore_ascii_case(target_name) {
                return Err(Error::invalid_query(format!(
                    "column {} does not belong to target {}",
                    column, target_name
                )));
            }
            name
        }
        None => column,
    };
    target_schema.field_index(name).ok_or_else(|| {
        Error::invalid_query(format!(
            "column {} does not exist in target {}",
            name, target_name
        ))
    })
}

fn bind_assignments(
    set: &[Assignment],
    target_name: &str,
    target_schema: &Schema,
    layout: &JoinedLayout,
    scope: BindScope,
) -> Result<Vec<(usize, Expr)>> {
    if set.is_empty() {
        return Err(Error::invalid_query("UPDATE requires at least one SET item"));
    }
    let mut seen = HashSet::new();
    set.iter()
        .map(|assignment| {
            let idx = target_column_index(&assignment.column, target_name, target_schema)?;
            if !seen.insert(idx) {
                return Err(Error::invalid_query(format!(
                    "column {} assigned more than once",
                    target_schema.fields()[idx].name
                )));
            }
            Ok((idx, layout.bind(&assignment.value, scope)?))
        })
        .collect()
}

fn bind_insert(
    columns: &[String],
    values: &[Expr],
    target_name: &str,
    target_schema: &Schema,
    layout: &JoinedLayout,
    scope: BindScope,
) -> Result<Vec<Expr>> {
    let indices: Vec<usize> = if columns.is_empty() {
        (0..target_schema.field_count()).collect()
    } else {
        columns
            .iter()
            .map(|c| target_column_index(c, target_name, target_schema))
            .collect::<Result<_>>()?
    };

    if indices.len() != values.len() {
        return Err(Error::invalid_query(format!(
            "INSERT has {} target columns but {} values",
            indices.len(),
            values.len()
        )));
    }

    let mut row = vec![Expr::literal_null(); target_schema.field_count()];
    let mut seen = HashSet::new();
    for (idx, value) in indices.into_iter().zip(values) {
        if !seen.insert(idx) {
            return Err(Error::invalid_query(format!(
                "column {} specified more than once in INSERT",
                target_schema.fields()[idx].name
            )));
        }
        row[idx] = layout.bind(value, scope)?;
    }
    Ok(row)
}
