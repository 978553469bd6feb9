use mergesql_common::types::{DataType, Value};
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Numeric(Decimal),
    String(String),
    Bytes(Vec<u8>),
}

impl Literal {
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Null => DataType::Unknown,
            Literal::Bool(_) => DataType::Bool,
            Literal::Int64(_) => DataType::Int64,
            Literal::Float64(_) => DataType::Float64,
            Literal::Numeric(_) => DataType::Numeric,
            Literal::String(_) => DataType::String,
            Literal::Bytes(_) => DataType::Bytes,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int64(n) => Value::Int64(*n),
            Literal::Float64(f) => Value::Float64(*f),
            Literal::Numeric(d) => Value::Numeric(*d),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bytes(b) => Value::Bytes(b.clone()),
        }
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(b),
            Value::Int64(n) => Literal::Int64(n),
            Value::Float64(f) => Literal::Float64(f),
            Value::Numeric(d) => Literal::Numeric(d),
            Value::String(s) => Literal::String(s),
            Value::Bytes(b) => Literal::Bytes(b),
            Value::Date(d) => Literal::String(d.to_string()),
            Value::Timestamp(ts) => Literal::String(ts.to_rfc3339()),
        }
    }
}
