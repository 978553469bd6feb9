use mergesql_common::types::Value;
use serde::{Deserialize, Serialize};

/// One row of values, positionally aligned with a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn nulls(len: usize) -> Self {
        Self {
            values: vec![Value::Null; len],
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Concatenates two records, `self` first.
    pub fn concat(&self, other: &Record) -> Record {
        let mut values = Vec::with_capacity(self.values.len() + other.values.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Record { values }
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Self::from_values(values)
    }
}
