//! Testing utilities for mergesql.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

use std::fmt::Debug;

use mergesql_common::types::{DataType, Value};
use mergesql_common::{Error, ErrorKind, Result};
use mergesql_storage::{
    Field, Record, RowStore, Schema, SharedStorage, Storage, Table, TransactionalStore,
};

/// `(id INT64 NOT NULL PRIMARY KEY, v STRING)`, the shape most merge tests use.
pub fn kv_schema() -> Schema {
    Schema::from_fields(vec![
        Field::required("id", DataType::Int64),
        Field::nullable("v", DataType::String),
    ])
    .with_primary_key(vec!["id"])
    .expect("kv schema has an id column")
}

pub fn kv_row(id: i64, v: &str) -> Vec<Value> {
    vec![Value::int64(id), Value::string(v)]
}

/// Creates `name` and commits `rows` into it in one transaction, in order.
pub fn seed_table(storage: &SharedStorage, name: &str, schema: Schema, rows: Vec<Vec<Value>>) {
    storage
        .write()
        .create_table(name, schema)
        .unwrap_or_else(|e| panic!("create table {}: {}", name, e));

    let mut txn = storage.write().begin(None);
    {
        let mut store = TransactionalStore::new(storage, &mut txn);
        for row in rows {
            store
                .insert(name, Record::from_values(row))
                .unwrap_or_else(|e| panic!("seed {}: {}", name, e));
        }
    }
    storage
        .write()
        .commit(txn)
        .unwrap_or_else(|e| panic!("commit seed of {}: {}", name, e));
}

/// `target` holds `(1,'a'), (2,'b')`; `source` holds `(2,'B'), (3,'c')`.
pub fn scenario_tables() -> SharedStorage {
    let storage = Storage::new().shared();
    seed_table(
        &storage,
        "target",
        kv_schema(),
        vec![kv_row(1, "a"), kv_row(2, "b")],
    );
    seed_table(
        &storage,
        "source",
        kv_schema(),
        vec![kv_row(2, "B"), kv_row(3, "c")],
    );
    storage
}

/// Committed rows of `table`, sorted so tests don't depend on storage order.
pub fn committed_values(storage: &SharedStorage, table: &str) -> Vec<Vec<Value>> {
    table_values(
        &storage
            .read()
            .committed_rows(table)
            .unwrap_or_else(|e| panic!("read {}: {}", table, e)),
    )
}

pub fn table_values(table: &Table) -> Vec<Vec<Value>> {
    table
        .clone()
        .sorted()
        .into_rows()
        .into_iter()
        .map(Record::into_values)
        .collect()
}

pub fn column_i64(table: &Table, name: &str) -> Vec<i64> {
    table
        .column(name)
        .unwrap_or_else(|| panic!("column {} not found", name))
        .iter()
        .map(|v| {
            v.as_i64()
                .unwrap_or_else(|| panic!("expected INT64 in {}, got {:?}", name, v))
        })
        .collect()
}

pub fn column_strings(table: &Table, name: &str) -> Vec<String> {
    table
        .column(name)
        .unwrap_or_else(|| panic!("column {} not found", name))
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}

pub fn assert_error_kind<T: Debug>(result: Result<T>, kind: ErrorKind) -> Error {
    match result {
        Ok(value) => panic!("expected {:?} error but got Ok({:?})", kind, value),
        Err(e) => {
            assert_eq!(e.kind(), kind, "unexpected error kind for: {}", e);
            e
        }
    }
}

pub fn assert_error_contains<T: Debug>(result: Result<T>, fragment: &str) {
    match result {
        Ok(value) => panic!("expected error containing '{}' but got Ok({:?})", fragment, value),
        Err(e) => {
            let message = e.to_string().to_lowercase();
            assert!(
                message.contains(&fragment.to_lowercase()),
                "error message '{}' does not contain '{}'",
                e,
                fragment
            );
        }
    }
}

/// Row-by-row comparison in stored order. Floats compare within 1e-9.
pub fn assert_table_values(actual: &Table, expected: Vec<Vec<Value>>) {
    assert_eq!(
        actual.num_rows(),
        expected.len(),
        "row count mismatch: expected {}, got {}\n{}",
        expected.len(),
        actual.num_rows(),
        actual
    );
    for (row_idx, (row, expected_row)) in actual.rows().iter().zip(&expected).enumerate() {
        assert_eq!(
            row.len(),
            expected_row.len(),
            "column count mismatch at row {}",
            row_idx
        );
        for (col_idx, (actual_val, expected_val)) in
            row.values().iter().zip(expected_row).enumerate()
        {
            assert_values_equal(actual_val, expected_val, row_idx, col_idx);
        }
    }
}

fn assert_values_equal(actual: &Value, expected: &Value, row: usize, col: usize) {
    if let (Value::Float64(a), Value::Float64(e)) = (actual, expected) {
        let diff = (a.0 - e.0).abs();
        assert!(
            diff < 1e-9 || (a.0.is_nan() && e.0.is_nan()),
            "float mismatch at row {} col {}: expected {}, got {}",
            row,
            col,
            e,
            a
        );
        return;
    }
    assert_eq!(
        actual, expected,
        "value mismatch at row {} col {}: expected {:?}, got {:?}",
        row, col, expected, actual
    );
}
