use mergesql_common::types::DataType;
use mergesql_ir::{BinaryOp, Expr, PlanSchema, ScalarFunction, UnaryOp};

/// Static result type of `expr` over rows shaped like `schema`.
/// `Unknown` when the type depends on data, e.g. a bare NULL.
pub fn infer_type(expr: &Expr, schema: &PlanSchema) -> DataType {
    match expr {
        Expr::Literal(lit) => lit.data_type(),
        Expr::Column { table, name, index } => index
            .and_then(|idx| schema.fields.get(idx))
            .or_else(|| {
                schema
                    .matching_indices(name, table.as_deref())
                    .first()
                    .and_then(|idx| schema.fields.get(*idx))
            })
            .map(|f| f.data_type.clone())
            .unwrap_or(DataType::Unknown),
        Expr::BinaryOp { left, op, right } => {
            if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) {
                return DataType::Bool;
            }
            if *op == BinaryOp::Concat {
                return DataType::String;
            }
            numeric_result(infer_type(left, schema), infer_type(right, schema))
        }
        Expr::UnaryOp { op, expr } => match op {
            UnaryOp::Not => DataType::Bool,
            UnaryOp::Minus | UnaryOp::Plus => infer_type(expr, schema),
        },
        Expr::ScalarFunction { name, args } => match name {
            ScalarFunction::Upper | ScalarFunction::Lower | ScalarFunction::Concat => {
                DataType::String
            }
            ScalarFunction::Length => DataType::Int64,
            ScalarFunction::Abs | ScalarFunction::NullIf => args
                .first()
                .map(|a| infer_type(a, schema))
                .unwrap_or(DataType::Unknown),
            ScalarFunction::Coalesce => first_known(args.iter().map(|a| infer_type(a, schema))),
        },
        Expr::Case {
            when_clauses,
            else_result,
            ..
        } => first_known(
            when_clauses
                .iter()
                .map(|c| infer_type(&c.result, schema))
                .chain(else_result.iter().map(|e| infer_type(e, schema))),
        ),
        Expr::IsNull { .. } | Expr::IsDistinctFrom { .. } | Expr::InList { .. } => DataType::Bool,
        Expr::MergeAction => DataType::String,
    }
}

fn numeric_result(left: DataType, right: DataType) -> DataType {
    match (left, right) {
        (DataType::Unknown, other) | (other, DataType::Unknown) => other,
        (DataType::Float64, _) | (_, DataType::Float64) => DataType::Float64,
        (DataType::Numeric, _) | (_, DataType::Numeric) => DataType::Numeric,
        (left, _) => left,
    }
}

fn first_known(types: impl Iterator<Item = DataType>) -> DataType {
    let mut types = types.filter(|t| *t != DataType::Unknown);
    types.next().unwrap_or(DataType::Unknown)
}
