use mergesql_common::types::DataType;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanSchema {
    pub fields: Vec<PlanField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanField {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub table: Option<String>,
}

impl PlanField {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            table: None,
        }
    }

    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            table: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

impl PlanSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn from_fields(fields: Vec<PlanField>) -> Self {
        Self { fields }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// All positions whose field matches `name`, restricted to `table` when
    /// the reference is qualified. Names compare case-insensitively.
    pub fn matching_indices(&self, name: &str, table: Option<&str>) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name.eq_ignore_ascii_case(name))
            .filter(|(_, f)| match table {
                Some(tbl) => f
                    .table
                    .as_ref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(tbl)),
                None => true,
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn with_table(self, table: &str) -> Self {
        Self {
            fields: self
                .fields
                .into_iter()
                .map(|f| f.with_table(table))
                .collect(),
        }
    }

    pub fn merge(self, other: PlanSchema) -> Self {
        let mut fields = self.fields;
        fields.extend(other.fields);
        Self { fields }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}
