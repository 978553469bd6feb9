use mergesql_common::error::{Error, Result};
use mergesql_common::types::DataType;
use mergesql_ir::{BinaryOp, Expr};

use super::binding::JoinedLayout;
use crate::ir_evaluator::infer_type;

/// An `ON` conjunct of the form `<target expr> = <source expr>`.
#[derive(Debug, Clone, PartialEq)]
pub struct EquiKey {
    pub target: Expr,
    pub source: Expr,
}

/// Equi-keys of a bound `ON` condition, checked against the joined schema.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinKeys {
    pub keys: Vec<EquiKey>,
    /// False when some key pair mixes numeric families whose equality
    /// `Value::join_key` cannot reproduce, e.g. FLOAT64 against NUMERIC.
    pub hashable: bool,
}

impl JoinKeys {
    /// Keys usable for a hash join, empty when hashing would miss matches.
    pub fn hash_keys(&self) -> &[EquiKey] {
        if self.hashable { &self.keys } else { &[] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    None,
    Target,
    Source,
    Both,
}

fn side_of(expr: &Expr, layout: &JoinedLayout) -> Side {
    let mut side = Side::None;
    expr.visit_columns(&mut |_, _, index| {
        let this = match index {
            Some(idx) if layout.is_target_index(idx) => Side::Target,
            Some(_) => Side::Source,
            None => Side::Both,
        };
        side = match (side, this) {
            (Side::None, s) => s,
            (a, b) if a == b => a,
            _ => Side::Both,
        };
    });
    side
}

/// Extracts equi-join keys from a bound `ON` condition. Conjuncts that are
/// not a target-only expression compared to a source-only expression are
/// left to the full condition, which is always re-checked per candidate.
pub fn extract_equi_keys(on: &Expr, layout: &JoinedLayout) -> Vec<EquiKey> {
    on.conjuncts()
        .into_iter()
        .filter_map(|conjunct| match conjunct {
            Expr::BinaryOp {
                left,
                op: BinaryOp::Eq,
                right,
            } => match (side_of(left, layout), side_of(right, layout)) {
                (Side::Target, Side::Source) => Some(EquiKey {
                    target: (**left).clone(),
                    source: (**right).clone(),
                }),
                (Side::Source, Side::Target) => Some(EquiKey {
                    target: (**right).clone(),
                    source: (**left).clone(),
                }),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Extracts the equi-keys and type-checks every pair before any row is
/// read. Pairs that can never compare fail with `TypeMismatch` whatever
/// join strategy later runs.
pub fn analyze_join_keys(on: &Expr, layout: &JoinedLayout) -> Result<JoinKeys> {
    let keys = extract_equi_keys(on, layout);
    let mut hashable = true;
    for key in &keys {
        let target = infer_type(&key.target, layout.schema());
        let source = infer_type(&key.source, layout.schema());
        hashable &= hashes_exactly(&target, &source)?;
    }
    Ok(JoinKeys { keys, hashable })
}

fn hashes_exactly(target: &DataType, source: &DataType) -> Result<bool> {
    match (target, source) {
        (DataType::Unknown, _) | (_, DataType::Unknown) => Ok(false),
        (a, b) if a == b => Ok(true),
        (DataType::Int64, DataType::Numeric) | (DataType::Numeric, DataType::Int64) => Ok(true),
        (a, b) if a.is_numeric() && b.is_numeric() => Ok(false),
        (a, b) => Err(Error::type_mismatch(a.to_string(), b.to_string())),
    }
}
