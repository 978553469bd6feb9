use mergesql_common::error::{Error, Result};
use mergesql_common::types::Value;
use mergesql_ir::ScalarFunction;

use super::helpers::values_equal;

pub(super) fn call(func: ScalarFunction, args: &[Value]) -> Result<Value> {
    match func {
        ScalarFunction::Upper => fn_upper(args),
        ScalarFunction::Lower => fn_lower(args),
        ScalarFunction::Length => fn_length(args),
        ScalarFunction::Coalesce => fn_coalesce(args),
        ScalarFunction::Concat => fn_concat(args),
        ScalarFunction::Abs => fn_abs(args),
        ScalarFunction::NullIf => fn_nullif(args),
    }
}

fn expect_args(func: ScalarFunction, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(Error::invalid_query(format!(
            "{} requires {} argument(s), got {}",
            func,
            count,
            args.len()
        )));
    }
    Ok(())
}

fn fn_upper(args: &[Value]) -> Result<Value> {
    expect_args(ScalarFunction::Upper, args, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.to_uppercase())),
        other => Err(Error::type_mismatch("STRING", other.data_type().to_string())),
    }
}

fn fn_lower(args: &[Value]) -> Result<Value> {
    expect_args(ScalarFunction::Lower, args, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.to_lowercase())),
        other => Err(Error::type_mismatch("STRING", other.data_type().to_string())),
    }
}

fn fn_length(args: &[Value]) -> Result<Value> {
    expect_args(ScalarFunction::Length, args, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::Int64(s.chars().count() as i64)),
        Value::Bytes(b) => Ok(Value::Int64(b.len() as i64)),
        other => Err(Error::type_mismatch("STRING", other.data_type().to_string())),
    }
}

fn fn_coalesce(args: &[Value]) -> Result<Value> {
    Ok(args
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

fn fn_concat(args: &[Value]) -> Result<Value> {
    let mut out = String::new();
    for arg in args.iter().filter(|v| !v.is_null()) {
        out.push_str(&arg.to_string());
    }
    Ok(Value::String(out))
}

fn fn_abs(args: &[Value]) -> Result<Value> {
    expect_args(ScalarFunction::Abs, args, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Int64(n) => n
            .checked_abs()
            .map(Value::Int64)
            .ok_or_else(|| Error::ArithmeticOverflow {
                operation: "ABS".to_string(),
                left: n.to_string(),
                right: String::new(),
            }),
        Value::Float64(f) => Ok(Value::float64(f.0.abs())),
        Value::Numeric(d) => Ok(Value::Numeric(d.abs())),
        other => Err(Error::type_mismatch("numeric", other.data_type().to_string())),
    }
}

fn fn_nullif(args: &[Value]) -> Result<Value> {
    expect_args(ScalarFunction::NullIf, args, 2)?;
    if values_equal(&args[0], &args[1])? == Some(true) {
        Ok(Value::Null)
    } else {
        Ok(args[0].clone())
    }
}
