use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::schema::PlanField;

/// The `USING` side of a merge: one or more inputs read as a single relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSource {
    pub alias: String,
    /// Declared column list. When absent the first input's projected schema
    /// is used.
    pub columns: Option<Vec<PlanField>>,
    pub inputs: Vec<SourceRelation>,
}

impl MergeSource {
    pub fn new(alias: impl Into<String>, input: SourceRelation) -> Self {
        Self {
            alias: alias.into(),
            columns: None,
            inputs: vec![input],
        }
    }

    pub fn table(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(alias, SourceRelation::table(name))
    }

    pub fn with_input(mut self, input: SourceRelation) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_columns(mut self, columns: Vec<PlanField>) -> Self {
        self.columns = Some(columns);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceRelation {
    Table { name: String },
    Query(Box<SourceQuery>),
    Cte { name: String },
    Values {
        fields: Vec<PlanField>,
        rows: Vec<Vec<Expr>>,
    },
}

impl SourceRelation {
    pub fn table(name: impl Into<String>) -> Self {
        SourceRelation::Table { name: name.into() }
    }

    pub fn cte(name: impl Into<String>) -> Self {
        SourceRelation::Cte { name: name.into() }
    }

    pub fn values(fields: Vec<PlanField>, rows: Vec<Vec<Expr>>) -> Self {
        SourceRelation::Values { fields, rows }
    }

    pub fn query(query: SourceQuery) -> Self {
        SourceRelation::Query(Box::new(query))
    }

    /// Short description used in diagnostics and plan output.
    pub fn label(&self) -> String {
        match self {
            SourceRelation::Table { name } => name.clone(),
            SourceRelation::Query(query) => format!("subquery over {}", query.from.label()),
            SourceRelation::Cte { name } => format!("cte {}", name),
            SourceRelation::Values { rows, .. } => format!("values ({} rows)", rows.len()),
        }
    }
}

/// `SELECT <projection> FROM <from> WHERE <filter>` over a single relation.
/// Column references resolve against `from`'s columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub from: SourceRelation,
    pub filter: Option<Expr>,
    /// `None` projects every column of `from`.
    pub projection: Option<Vec<(Expr, String)>>,
}

impl SourceQuery {
    pub fn from(relation: SourceRelation) -> Self {
        Self {
            from: relation,
            filter: None,
            projection: None,
        }
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn project(mut self, items: Vec<(Expr, &str)>) -> Self {
        self.projection = Some(
            items
                .into_iter()
                .map(|(expr, name)| (expr, name.to_string()))
                .collect(),
        );
        self
    }
}
