use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CteDefinition, MergeSource};
use crate::expr::Expr;
use crate::schema::Assignment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeCategory {
    Matched,
    NotMatchedByTarget,
    NotMatchedBySource,
}

impl MergeCategory {
    pub const ALL: [MergeCategory; 3] = [
        MergeCategory::Matched,
        MergeCategory::NotMatchedByTarget,
        MergeCategory::NotMatchedBySource,
    ];
}

impl fmt::Display for MergeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeCategory::Matched => write!(f, "MATCHED"),
            MergeCategory::NotMatchedByTarget => write!(f, "NOT MATCHED BY TARGET"),
            MergeCategory::NotMatchedBySource => write!(f, "NOT MATCHED BY SOURCE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeAction {
    Update(Vec<Assignment>),
    Delete,
    Insert {
        /// Empty means every target column in declaration order.
        columns: Vec<String>,
        values: Vec<Expr>,
    },
    DoNothing,
}

impl MergeAction {
    pub fn name(&self) -> &'static str {
        match self {
            MergeAction::Update(_) => "UPDATE",
            MergeAction::Delete => "DELETE",
            MergeAction::Insert { .. } => "INSERT",
            MergeAction::DoNothing => "DO NOTHING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub category: MergeCategory,
    pub condition: Option<Expr>,
    pub action: MergeAction,
}

impl WhenClause {
    pub fn new(category: MergeCategory, action: MergeAction) -> Self {
        Self {
            category,
            condition: None,
            action,
        }
    }

    pub fn with_condition(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReturningItem {
    /// `RETURNING *`: every target column.
    AllTargetColumns,
    Expr { expr: Expr, alias: Option<String> },
}

impl ReturningItem {
    pub fn expr(expr: Expr) -> Self {
        ReturningItem::Expr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        ReturningItem::Expr {
            expr,
            alias: Some(alias.into()),
        }
    }
}

/// A `MERGE` statement as handed to the executor. Clause order is source
/// order and is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStatement {
    pub ctes: Vec<CteDefinition>,
    pub target: String,
    pub target_alias: Option<String>,
    pub source: MergeSource,
    pub on: Expr,
    pub clauses: Vec<WhenClause>,
    pub returning: Option<Vec<ReturningItem>>,
}

impl MergeStatement {
    pub fn new(target: impl Into<String>, source: MergeSource, on: Expr) -> Self {
        Self {
            ctes: Vec::new(),
            target: target.into(),
            target_alias: None,
            source,
            on,
            clauses: Vec::new(),
            returning: None,
        }
    }

    pub fn target_name(&self) -> &str {
        self.target_alias.as_deref().unwrap_or(&self.target)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.target_alias = Some(alias.into());
        self
    }

    pub fn with_cte(mut self, cte: CteDefinition) -> Self {
        self.ctes.push(cte);
        self
    }

    pub fn when(mut self, clause: WhenClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn when_matched_update(self, condition: Option<Expr>, set: Vec<Assignment>) -> Self {
        self.push_clause(MergeCategory::Matched, condition, MergeAction::Update(set))
    }

    pub fn when_matched_delete(self, condition: Option<Expr>) -> Self {
        self.push_clause(MergeCategory::Matched, condition, MergeAction::Delete)
    }

    pub fn when_matched_do_nothing(self, condition: Option<Expr>) -> Self {
        self.push_clause(MergeCategory::Matched, condition, MergeAction::DoNothing)
    }

    pub fn when_not_matched_insert(
        self,
        condition: Option<Expr>,
        columns: Vec<&str>,
        values: Vec<Expr>,
    ) -> Self {
        let columns = columns.into_iter().map(str::to_string).collect();
        self.push_clause(
            MergeCategory::NotMatchedByTarget,
            condition,
            MergeAction::Insert { columns, values },
        )
    }

    pub fn when_not_matched_by_source_update(
        self,
        condition: Option<Expr>,
        set: Vec<Assignment>,
    ) -> Self {
        self.push_clause(
            MergeCategory::NotMatchedBySource,
            condition,
            MergeAction::Update(set),
        )
    }

    pub fn when_not_matched_by_source_delete(self, condition: Option<Expr>) -> Self {
        self.push_clause(
            MergeCategory::NotMatchedBySource,
            condition,
            MergeAction::Delete,
        )
    }

    pub fn returning(mut self, items: Vec<ReturningItem>) -> Self {
        self.returning = Some(items);
        self
    }

    fn push_clause(
        mut self,
        category: MergeCategory,
        condition: Option<Expr>,
        action: MergeAction,
    ) -> Self {
        self.clauses.push(WhenClause {
            category,
            condition,
            action,
        });
        self
    }
}
