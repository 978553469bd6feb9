use mergesql_common::error::{Error, Result};
use mergesql_common::types::Value;

use crate::{Record, Schema};

/// Checks shape and declared types, widening integers where the column
/// asks for it. Returns the record as it will be stored.
pub fn conform_record(schema: &Schema, record: Record) -> Result<Record> {
    if record.len() != schema.field_count() {
        return Err(Error::ConstraintViolation(format!(
            "expected {} values, got {}",
            schema.field_count(),
            record.len()
        )));
    }

    let values = record
        .into_values()
        .into_iter()
        .zip(schema.fields())
        .map(|(value, field)| {
            if value.is_null() || value.data_type().is_assignable_to(&field.data_type) {
                Ok(value.coerce_to(&field.data_type))
            } else {
                Err(Error::ConstraintViolation(format!(
                    "column '{}' is {} but value {} is {}",
                    field.name,
                    field.data_type,
                    value,
                    value.data_type()
                )))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Record::from_values(values))
}

pub fn validate_row_constraints<'a>(
    schema: &Schema,
    row: &Record,
    existing_rows: impl Iterator<Item = &'a Record> + Clone,
) -> Result<()> {
    validate_not_null_constraints(schema, row)?;
    validate_primary_key_constraints(schema, row, existing_rows.clone())?;
    validate_column_unique_constraints(schema, row, existing_rows)?;
    Ok(())
}

fn validate_not_null_constraints(schema: &Schema, row: &Record) -> Result<()> {
    for (idx, field) in schema.fields().iter().enumerate() {
        if !field.is_nullable() && row.get(idx).is_none_or(Value::is_null) {
            return Err(Error::NotNullViolation {
                column: field.name.clone(),
            });
        }
    }
    Ok(())
}

fn validate_primary_key_constraints<'a>(
    schema: &Schema,
    row: &Record,
    mut existing_rows: impl Iterator<Item = &'a Record>,
) -> Result<()> {
    let Some(pk_columns) = schema.primary_key() else {
        return Ok(());
    };
    let indices = schema.primary_key_indices();

    if existing_rows.any(|existing| columns_match(&indices, row, existing)) {
        return Err(Error::UniqueConstraintViolation(format!(
            "PRIMARY KEY constraint violation: duplicate key value violates unique constraint on columns: {}",
            pk_columns.join(", ")
        )));
    }

    Ok(())
}

/// Whether `row` collides with any of `rows` on the primary key or on a
/// UNIQUE column. NULLs never collide.
pub fn conflicts_on_unique_key<'a>(
    schema: &Schema,
    row: &Record,
    mut rows: impl Iterator<Item = &'a Record>,
) -> bool {
    let pk = schema.primary_key().map(|_| schema.primary_key_indices());
    let unique: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| field.is_unique)
        .map(|(idx, _)| idx)
        .collect();
    if pk.is_none() && unique.is_empty() {
        return false;
    }

    rows.any(|other| {
        pk.as_deref()
            .is_some_and(|indices| columns_match(indices, row, other))
            || unique.iter().any(|&idx| {
                row.get(idx)
                    .is_some_and(|value| !value.is_null() && other.get(idx) == Some(value))
            })
    })
}

fn columns_match(indices: &[usize], row1: &Record, row2: &Record) -> bool {
    indices.iter().all(|&idx| row1.get(idx) == row2.get(idx))
}

fn validate_column_unique_constraints<'a>(
    schema: &Schema,
    row: &Record,
    existing_rows: impl Iterator<Item = &'a Record> + Clone,
) -> Result<()> {
    for (idx, field) in schema.fields().iter().enumerate() {
        if !field.is_unique {
            continue;
        }

        let Some(value) = row.get(idx).filter(|v| !v.is_null()) else {
            continue;
        };

        if existing_rows.clone().any(|existing| existing.get(idx) == Some(value)) {
            return Err(Error::UniqueConstraintViolation(format!(
                "UNIQUE constraint violation: duplicate value in column '{}'",
                field.name
            )));
        }
    }
    Ok(())
}
