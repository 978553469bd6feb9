use std::fmt;

use super::{Expr, Literal, UnaryOp};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Int64(n) => write!(f, "{}", n),
            Literal::Float64(v) => write!(f, "{}", v),
            Literal::Numeric(d) => write!(f, "{}", d),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Column {
                table: Some(table),
                name,
                ..
            } => write!(f, "{}.{}", table, name),
            Expr::Column { name, .. } => write!(f, "{}", name),
            Expr::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", expr),
                UnaryOp::Minus => write!(f, "-{}", expr),
                UnaryOp::Plus => write!(f, "+{}", expr),
            },
            Expr::ScalarFunction { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Case {
                operand,
                when_clauses,
                else_result,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for clause in when_clauses {
                    write!(f, " WHEN {} THEN {}", clause.condition, clause.result)?;
                }
                if let Some(else_result) = else_result {
                    write!(f, " ELSE {}", else_result)?;
                }
                write!(f, " END")
            }
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::IsDistinctFrom {
                left,
                right,
                negated,
            } => write!(
                f,
                "{} IS {}DISTINCT FROM {}",
                left,
                if *negated { "NOT " } else { "" },
                right
            ),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Expr::MergeAction => write!(f, "merge_action()"),
        }
    }
}
