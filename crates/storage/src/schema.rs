use mergesql_common::error::{Error, Result};
use mergesql_common::types::DataType;
use serde::{Deserialize, Serialize};

use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub mode: FieldMode,
    pub is_unique: bool,
}

impl Field {
    fn new(name: impl Into<String>, data_type: DataType, mode: FieldMode) -> Self {
        Self {
            name: name.into(),
            data_type,
            mode,
            is_unique: false,
        }
    }

    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, FieldMode::Nullable)
    }

    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, FieldMode::Required)
    }

    pub fn with_unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.mode == FieldMode::Nullable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Schema {
    fields: Vec<Field>,
    primary_key: Option<Vec<String>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self {
            fields,
            primary_key: None,
        }
    }

    /// Declares the primary key. Key columns become NOT NULL.
    pub fn with_primary_key(mut self, columns: Vec<&str>) -> Result<Self> {
        for column in &columns {
            let idx = self
                .field_index(column)
                .ok_or_else(|| Error::column_not_found(column.to_string()))?;
            self.fields[idx].mode = FieldMode::Required;
        }
        self.primary_key = Some(columns.into_iter().map(str::to_string).collect());
        Ok(self)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Option<&[String]> {
        self.primary_key.as_deref()
    }

    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.primary_key
            .iter()
            .flatten()
            .filter_map(|col| self.field_index(col))
            .collect()
    }

    /// Human-readable identity of a row, used in error messages:
    /// `id=2` for keyed tables, the row id otherwise.
    pub fn describe_key(&self, record: &Record, fallback: impl std::fmt::Display) -> String {
        let indices = self.primary_key_indices();
        if indices.is_empty() {
            return format!("#{}", fallback);
        }
        indices
            .iter()
            .map(|&idx| {
                format!(
                    "{}={}",
                    self.fields[idx].name,
                    record.get(idx).map(|v| v.to_string()).unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
