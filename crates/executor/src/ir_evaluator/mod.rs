#![allow(clippy::only_used_in_recursion)]

mod functions;
mod helpers;
mod type_inference;

use helpers::{compare_values, values_equal};
use mergesql_common::error::{Error, Result};
use mergesql_common::types::Value;
use mergesql_ir::{BinaryOp, CaseWhen, Expr, PlanSchema, UnaryOp};
use mergesql_storage::Record;
pub use type_inference::infer_type;

/// Evaluates expressions against one record laid out by `schema`.
pub struct IrEvaluator<'a> {
    schema: &'a PlanSchema,
    merge_action: Option<&'a str>,
}

impl<'a> IrEvaluator<'a> {
    pub fn new(schema: &'a PlanSchema) -> Self {
        Self {
            schema,
            merge_action: None,
        }
    }

    /// Sets the tag `merge_action()` evaluates to.
    pub fn with_merge_action(mut self, action: &'a str) -> Self {
        self.merge_action = Some(action);
        self
    }

    pub fn evaluate(&self, expr: &Expr, record: &Record) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(lit.to_value()),
            Expr::Column { table, name, index } => {
                self.eval_column(table.as_deref(), name, *index, record)
            }
            Expr::BinaryOp { left, op, right } => self.eval_binary_op(left, *op, right, record),
            Expr::UnaryOp { op, expr } => self.eval_unary_op(*op, expr, record),
            Expr::ScalarFunction { name, args } => {
                let arg_values: Vec<Value> = args
                    .iter()
                    .map(|a| self.evaluate(a, record))
                    .collect::<Result<_>>()?;
                functions::call(*name, &arg_values)
            }
            Expr::Case {
                operand,
                when_clauses,
                else_result,
            } => self.eval_case(
                operand.as_deref(),
                when_clauses,
                else_result.as_deref(),
                record,
            ),
            Expr::IsNull { expr, negated } => {
                let is_null = self.evaluate(expr, record)?.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            Expr::IsDistinctFrom {
                left,
                right,
                negated,
            } => self.eval_is_distinct_from(left, right, *negated, record),
            Expr::InList {
                expr,
                list,
                negated,
            } => self.eval_in_list(expr, list, *negated, record),
            Expr::MergeAction => self.merge_action.map(Value::string).ok_or_else(|| {
                Error::invalid_query("merge_action() is only valid in MERGE ... RETURNING")
            }),
        }
    }

    /// Predicate evaluation: NULL is false, anything but a boolean is a
    /// type error.
    pub fn evaluate_bool(&self, expr: &Expr, record: &Record) -> Result<bool> {
        match self.evaluate(expr, record)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(Error::type_mismatch("BOOL", other.data_type().to_string())),
        }
    }

    fn eval_column(
        &self,
        table: Option<&str>,
        name: &str,
        index: Option<usize>,
        record: &Record,
    ) -> Result<Value> {
        if let Some(idx) = index
            && let Some(value) = record.get(idx)
        {
            return Ok(value.clone());
        }

        let idx = self
            .schema
            .matching_indices(name, table)
            .first()
            .copied()
            .ok_or_else(|| Error::column_not_found(qualified_name(table, name)))?;
        record
            .get(idx)
            .cloned()
            .ok_or_else(|| Error::column_not_found(qualified_name(table, name)))
    }

    fn eval_binary_op(
        &self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        record: &Record,
    ) -> Result<Value> {
        let left_val = self.evaluate(left, record)?;

        match (op, &left_val) {
            (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
            (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
            _ => {}
        }

        let right_val = self.evaluate(right, record)?;

        match op {
            BinaryOp::Add => helpers::add_values(&left_val, &right_val),
            BinaryOp::Sub => helpers::sub_values(&left_val, &right_val),
            BinaryOp::Mul => helpers::mul_values(&left_val, &right_val),
            BinaryOp::Div => helpers::div_values(&left_val, &right_val),
            BinaryOp::Mod => helpers::mod_values(&left_val, &right_val),
            BinaryOp::Eq => compare_values(&left_val, &right_val, |ord| ord.is_eq()),
            BinaryOp::NotEq => compare_values(&left_val, &right_val, |ord| ord.is_ne()),
            BinaryOp::Lt => compare_values(&left_val, &right_val, |ord| ord.is_lt()),
            BinaryOp::LtEq => compare_values(&left_val, &right_val, |ord| ord.is_le()),
            BinaryOp::Gt => compare_values(&left_val, &right_val, |ord| ord.is_gt()),
            BinaryOp::GtEq => compare_values(&left_val, &right_val, |ord| ord.is_ge()),
            BinaryOp::And => helpers::and_values(&left_val, &right_val),
            BinaryOp::Or => helpers::or_values(&left_val, &right_val),
            BinaryOp::Concat => helpers::concat_values(&left_val, &right_val),
        }
    }

    fn eval_unary_op(&self, op: UnaryOp, expr: &Expr, record: &Record) -> Result<Value> {
        let val = self.evaluate(expr, record)?;

        match op {
            UnaryOp::Not => match val {
                Value::Null => Ok(Value::Null),
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(Error::type_mismatch("BOOL", other.data_type().to_string())),
            },
            UnaryOp::Minus => match val {
                Value::Null => Ok(Value::Null),
                Value::Int64(n) => n.checked_neg().map(Value::Int64).ok_or_else(|| {
                    Error::ArithmeticOverflow {
                        operation: "negation".to_string(),
                        left: n.to_string(),
                        right: String::new(),
                    }
                }),
                Value::Float64(f) => Ok(Value::float64(-f.0)),
                Value::Numeric(d) => Ok(Value::Numeric(-d)),
                other => Err(Error::type_mismatch("numeric", other.data_type().to_string())),
            },
            UnaryOp::Plus => Ok(val),
        }
    }

    fn eval_case(
        &self,
        operand: Option<&Expr>,
        when_clauses: &[CaseWhen],
        else_result: Option<&Expr>,
        record: &Record,
    ) -> Result<Value> {
        match operand {
            Some(op_expr) => {
                let op_val = self.evaluate(op_expr, record)?;
                for clause in when_clauses {
                    let when_val = self.evaluate(&clause.condition, record)?;
                    if values_equal(&op_val, &when_val)? == Some(true) {
                        return self.evaluate(&clause.result, record);
                    }
                }
            }
            None => {
                for clause in when_clauses {
                    if self.evaluate_bool(&clause.condition, record)? {
                        return self.evaluate(&clause.result, record);
                    }
                }
            }
        }

        match else_result {
            Some(e) => self.evaluate(e, record),
            None => Ok(Value::Null),
        }
    }

    fn eval_is_distinct_from(
        &self,
        left: &Expr,
        right: &Expr,
        negated: bool,
        record: &Record,
    ) -> Result<Value> {
        let left_val = self.evaluate(left, record)?;
        let right_val = self.evaluate(right, record)?;

        let is_distinct = match (left_val.is_null(), right_val.is_null()) {
            (true, true) => false,
            (true, false) | (false, true) => true,
            (false, false) => values_equal(&left_val, &right_val)? != Some(true),
        };

        Ok(Value::Bool(is_distinct != negated))
    }

    fn eval_in_list(
        &self,
        expr: &Expr,
        list: &[Expr],
        negated: bool,
        record: &Record,
    ) -> Result<Value> {
        let val = self.evaluate(expr, record)?;
        if val.is_null() {
            return Ok(Value::Null);
        }

        let mut has_null = false;
        for item in list {
            let item_val = self.evaluate(item, record)?;
            match values_equal(&val, &item_val)? {
                Some(true) => return Ok(Value::Bool(!negated)),
                Some(false) => {}
                None => has_null = true,
            }
        }

        if has_null {
            Ok(Value::Null)
        } else {
            Ok(Value::Bool(negated))
        }
    }
}

fn qualified_name(table: Option<&str>, name: &str) -> String {
    match table {
        Some(t) => format!("{}.{}", t, name),
        None => name.to_string(),
    }
}
