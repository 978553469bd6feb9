use std::fmt;

use mergesql_common::error::{Error, Result};
use mergesql_common::types::Value;

use crate::record::Record;
use crate::schema::Schema;

/// A materialized relation: a schema plus rows in a fixed order. Used for
/// scan results and `RETURNING` output.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Record>,
}

impl Table {
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn from_records(schema: Schema, rows: Vec<Record>) -> Result<Self> {
        let width = schema.field_count();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(Error::schema_mismatch(format!(
                "row has {} values but schema has {} columns",
                bad.len(),
                width
            )));
        }
        Ok(Self { schema, rows })
    }

    pub fn from_values(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self> {
        Self::from_records(schema, rows.into_iter().map(Record::from_values).collect())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.schema.field_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// Rows ordered by every column, nulls last. Lets callers compare
    /// relations without depending on storage order.
    pub fn sorted(mut self) -> Self {
        self.rows.sort_by(|a, b| a.values().cmp(b.values()));
        self
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header: Vec<&str> = self.schema.fields().iter().map(|f| f.name.as_str()).collect();
        writeln!(f, "{}", header.join(" | "))?;
        for row in &self.rows {
            let cells: Vec<String> = row.values().iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        Ok(())
    }
}
