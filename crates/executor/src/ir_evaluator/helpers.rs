use std::cmp::Ordering;

use mergesql_common::error::{Error, Result};
use mergesql_common::types::Value;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;

/// Orders two non-null values, widening across numeric types.
pub(super) fn order_values(left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Ok(a.cmp(b)),
        (Value::Float64(a), Value::Float64(b)) => Ok(a.cmp(b)),
        (Value::Numeric(a), Value::Numeric(b)) => Ok(a.cmp(b)),
        (Value::Int64(a), Value::Numeric(b)) => Ok(Decimal::from(*a).cmp(b)),
        (Value::Numeric(a), Value::Int64(b)) => Ok(a.cmp(&Decimal::from(*b))),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Ok(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
        (a, b) if a.data_type().is_numeric() && b.data_type().is_numeric() => {
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Ok(OrderedFloat(x).cmp(&OrderedFloat(y))),
                _ => Err(Error::evaluation(format!("cannot compare {} and {}", a, b))),
            }
        }
        (a, b) => Err(Error::type_mismatch(
            a.data_type().to_string(),
            b.data_type().to_string(),
        )),
    }
}

/// `None` when either side is NULL.
pub(super) fn values_equal(left: &Value, right: &Value) -> Result<Option<bool>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    Ok(Some(order_values(left, right)?.is_eq()))
}

pub(super) fn compare_values(
    left: &Value,
    right: &Value,
    pred: impl FnOnce(Ordering) -> bool,
) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(pred(order_values(left, right)?)))
}

pub(super) fn and_values(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Ok(Value::Bool(false)),
        (Value::Bool(true), Value::Bool(true)) => Ok(Value::Bool(true)),
        (Value::Null | Value::Bool(_), Value::Null | Value::Bool(_)) => Ok(Value::Null),
        (Value::Null | Value::Bool(_), other) | (other, _) => Err(Error::type_mismatch(
            "BOOL",
            other.data_type().to_string(),
        )),
    }
}

pub(super) fn or_values(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Bool(true), _) | (_, Value::Bool(true)) => Ok(Value::Bool(true)),
        (Value::Bool(false), Value::Bool(false)) => Ok(Value::Bool(false)),
        (Value::Null | Value::Bool(_), Value::Null | Value::Bool(_)) => Ok(Value::Null),
        (Value::Null | Value::Bool(_), other) | (other, _) => Err(Error::type_mismatch(
            "BOOL",
            other.data_type().to_string(),
        )),
    }
}

pub(super) fn concat_values(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::Bytes(a), Value::Bytes(b)) => {
            let mut out = a.clone();
            out.extend_from_slice(b);
            Ok(Value::Bytes(out))
        }
        (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),
        (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (a, b) => Err(Error::type_mismatch(
            "STRING",
            format!("{} || {}", a.data_type(), b.data_type()),
        )),
    }
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl Arith {
    fn name(self) -> &'static str {
        match self {
            Arith::Add => "addition",
            Arith::Sub => "subtraction",
            Arith::Mul => "multiplication",
            Arith::Div => "division",
            Arith::Mod => "modulo",
        }
    }
}

fn overflow(op: Arith, left: &Value, right: &Value) -> Error {
    Error::ArithmeticOverflow {
        operation: op.name().to_string(),
        left: left.to_string(),
        right: right.to_string(),
    }
}

fn arithmetic(op: Arith, left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int64(a), Value::Int64(b)) => {
            let (a, b) = (*a, *b);
            if matches!(op, Arith::Div | Arith::Mod) && b == 0 {
                return Err(Error::DivisionByZero);
            }
            let result = match op {
                Arith::Add => a.checked_add(b),
                Arith::Sub => a.checked_sub(b),
                Arith::Mul => a.checked_mul(b),
                Arith::Div => a.checked_div(b),
                Arith::Mod => a.checked_rem(b),
            };
            result
                .map(Value::Int64)
                .ok_or_else(|| overflow(op, left, right))
        }
        (Value::Numeric(_), Value::Numeric(_) | Value::Int64(_))
        | (Value::Int64(_), Value::Numeric(_)) => {
            let (Some(a), Some(b)) = (left.as_numeric(), right.as_numeric()) else {
                return Err(overflow(op, left, right));
            };
            if matches!(op, Arith::Div | Arith::Mod) && b.is_zero() {
                return Err(Error::DivisionByZero);
            }
            let result = match op {
                Arith::Add => a.checked_add(b),
                Arith::Sub => a.checked_sub(b),
                Arith::Mul => a.checked_mul(b),
                Arith::Div => a.checked_div(b),
                Arith::Mod => a.checked_rem(b),
            };
            result
                .map(Value::Numeric)
                .ok_or_else(|| overflow(op, left, right))
        }
        (a, b) if a.data_type().is_numeric() && b.data_type().is_numeric() => {
            let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                return Err(overflow(op, left, right));
            };
            if matches!(op, Arith::Div | Arith::Mod) && y == 0.0 {
                return Err(Error::DivisionByZero);
            }
            let result = match op {
                Arith::Add => x + y,
                Arith::Sub => x - y,
                Arith::Mul => x * y,
                Arith::Div => x / y,
                Arith::Mod => x % y,
            };
            Ok(Value::float64(result))
        }
        (a, b) => Err(Error::type_mismatch(
            "numeric",
            format!("{} {} {}", a.data_type(), op.name(), b.data_type()),
        )),
    }
}

pub(super) fn add_values(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(Arith::Add, left, right)
}

pub(super) fn sub_values(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(Arith::Sub, left, right)
}

pub(super) fn mul_values(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(Arith::Mul, left, right)
}

pub(super) fn div_values(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(Arith::Div, left, right)
}

pub(super) fn mod_values(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(Arith::Mod, left, right)
}
