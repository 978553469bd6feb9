mod display;
mod functions;
mod literal;
mod operators;
mod types;

pub use functions::*;
pub use literal::*;
pub use operators::*;
use serde::{Deserialize, Serialize};
pub use types::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),

    /// `index` is filled in by binding; unbound columns are resolved by name.
    Column {
        table: Option<String>,
        name: String,
        index: Option<usize>,
    },

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },

    ScalarFunction {
        name: ScalarFunction,
        args: Vec<Expr>,
    },

    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<CaseWhen>,
        else_result: Option<Box<Expr>>,
    },

    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    IsDistinctFrom {
        left: Box<Expr>,
        right: Box<Expr>,
        negated: bool,
    },

    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    /// `merge_action()`: the action tag of the row being returned.
    MergeAction,
}

impl Expr {
    pub fn literal_null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn literal_bool(v: bool) -> Self {
        Expr::Literal(Literal::Bool(v))
    }

    pub fn literal_i64(v: i64) -> Self {
        Expr::Literal(Literal::Int64(v))
    }

    pub fn literal_f64(v: f64) -> Self {
        Expr::Literal(Literal::Float64(ordered_float::OrderedFloat(v)))
    }

    pub fn literal_string(v: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(v.into()))
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
            index: None,
        }
    }

    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: name.into(),
            index: None,
        }
    }

    pub fn function(name: ScalarFunction, args: Vec<Expr>) -> Self {
        Expr::ScalarFunction { name, args }
    }

    pub fn binary(self, op: BinaryOp, other: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(other),
        }
    }

    pub fn eq(self, other: Expr) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn not_eq(self, other: Expr) -> Self {
        self.binary(BinaryOp::NotEq, other)
    }

    pub fn lt(self, other: Expr) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn and(self, other: Expr) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: Expr) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    pub fn add(self, other: Expr) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    pub fn not(self) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::Not,
            expr: Box::new(self),
        }
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    /// Visits every column reference in the tree, in evaluation order.
    pub fn for_each_column<'a>(&'a self, f: &mut impl FnMut(Option<&'a str>, &'a str)) {
        self.visit_columns(&mut |table, name, _| f(table, name));
    }

    /// Like [`Expr::for_each_column`], also passing the bound index.
    pub fn visit_columns<'a>(
        &'a self,
        f: &mut impl FnMut(Option<&'a str>, &'a str, Option<usize>),
    ) {
        match self {
            Expr::Column { table, name, index } => f(table.as_deref(), name, *index),
            Expr::Literal(_) | Expr::MergeAction => {}
            Expr::BinaryOp { left, right, .. }
            | Expr::IsDistinctFrom { left, right, .. } => {
                left.visit_columns(f);
                right.visit_columns(f);
            }
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => expr.visit_columns(f),
            Expr::ScalarFunction { args, .. } => {
                for arg in args {
                    arg.visit_columns(f);
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_result,
            } => {
                if let Some(operand) = operand {
                    operand.visit_columns(f);
                }
                for clause in when_clauses {
                    clause.condition.visit_columns(f);
                    clause.result.visit_columns(f);
                }
                if let Some(else_result) = else_result {
                    else_result.visit_columns(f);
                }
            }
            Expr::InList { expr, list, .. } => {
                expr.visit_columns(f);
                for item in list {
                    item.visit_columns(f);
                }
            }
        }
    }

    /// Rewrites every column reference in place. Used by binding.
    pub fn try_map_columns<E>(
        &mut self,
        f: &mut impl FnMut(&mut Option<String>, &str, &mut Option<usize>) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Expr::Column { table, name, index } => f(table, name, index),
            Expr::Literal(_) | Expr::MergeAction => Ok(()),
            Expr::BinaryOp { left, right, .. }
            | Expr::IsDistinctFrom { left, right, .. } => {
                left.try_map_columns(f)?;
                right.try_map_columns(f)
            }
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => expr.try_map_columns(f),
            Expr::ScalarFunction { args, .. } => {
                for arg in args {
                    arg.try_map_columns(f)?;
                }
                Ok(())
            }
            Expr::Case {
                operand,
                when_clauses,
                else_result,
            } => {
                if let Some(operand) = operand {
                    operand.try_map_columns(f)?;
                }
                for clause in when_clauses {
                    clause.condition.try_map_columns(f)?;
                    clause.result.try_map_columns(f)?;
                }
                if let Some(else_result) = else_result {
                    else_result.try_map_columns(f)?;
                }
                Ok(())
            }
            Expr::InList { expr, list, .. } => {
                expr.try_map_columns(f)?;
                for item in list {
                    item.try_map_columns(f)?;
                }
                Ok(())
            }
        }
    }

    pub fn contains_merge_action(&self) -> bool {
        match self {
            Expr::MergeAction => true,
            Expr::Literal(_) | Expr::Column { .. } => false,
            Expr::BinaryOp { left, right, .. }
            | Expr::IsDistinctFrom { left, right, .. } => {
                left.contains_merge_action() || right.contains_merge_action()
            }
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => expr.contains_merge_action(),
            Expr::ScalarFunction { args, .. } => args.iter().any(Expr::contains_merge_action),
            Expr::Case {
                operand,
                when_clauses,
                else_result,
            } => {
                operand.as_deref().is_some_and(Expr::contains_merge_action)
                    || when_clauses.iter().any(|c| {
                        c.condition.contains_merge_action() || c.result.contains_merge_action()
                    })
                    || else_result.as_deref().is_some_and(Expr::contains_merge_action)
            }
            Expr::InList { expr, list, .. } => {
                expr.contains_merge_action() || list.iter().any(Expr::contains_merge_action)
            }
        }
    }

    /// Splits a predicate on top-level `AND`s.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }
}
