use mergesql_common::error::{Error, Result};

use crate::mvcc::{RowId, WriteBlocked};
use crate::transaction::Transaction;
use crate::{
    Record, Schema, SharedStorage, conflicts_on_unique_key, conform_record,
    validate_row_constraints,
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub row_id: RowId,
    pub record: Record,
}

pub type RowScan = std::vec::IntoIter<StoredRow>;

/// Row-oriented read/write access to stored relations under one
/// transaction's snapshot.
pub trait RowStore {
    fn schema(&self, table: &str) -> Result<Schema>;

    fn scan(&self, table: &str) -> Result<RowScan>;

    fn read_current(&self, table: &str, row_id: RowId) -> Result<Record>;

    /// Replaces the row's values. Returns the values as stored.
    fn write(&mut self, table: &str, row_id: RowId, record: Record) -> Result<Record>;

    fn delete(&mut self, table: &str, row_id: RowId) -> Result<()>;

    fn insert(&mut self, table: &str, record: Record) -> Result<StoredRow>;
}

/// [`RowStore`] over shared storage for one transaction. The storage lock
/// is taken per call, never across calls.
pub struct TransactionalStore<'a> {
    storage: &'a SharedStorage,
    txn: &'a mut Transaction,
}

impl<'a> TransactionalStore<'a> {
    pub fn new(storage: &'a SharedStorage, txn: &'a mut Transaction) -> Self {
        Self { storage, txn }
    }

    pub fn transaction(&self) -> &Transaction {
        self.txn
    }

    fn blocked_error(
        table: &str,
        row_id: RowId,
        key: String,
        blocked: WriteBlocked,
    ) -> Error {
        match blocked {
            WriteBlocked::Conflict => Error::concurrent_update(table, key),
            WriteBlocked::Missing => {
                Error::RowNotFound(format!("{} row {} (id {})", table, key, row_id))
            }
        }
    }
}

impl RowStore for TransactionalStore<'_> {
    fn schema(&self, table: &str) -> Result<Schema> {
        Ok(self.storage.read().get_table(table)?.schema().clone())
    }

    fn scan(&self, table: &str) -> Result<RowScan> {
        let storage = self.storage.read();
        let rows: Vec<StoredRow> = storage
            .get_table(table)?
            .scan(self.txn.view())
            .map(|(row_id, record)| StoredRow {
                row_id,
                record: record.clone(),
            })
            .collect();
        Ok(rows.into_iter())
    }

    fn read_current(&self, table: &str, row_id: RowId) -> Result<Record> {
        self.storage
            .read()
            .get_table(table)?
            .visible(row_id, self.txn.view())
            .cloned()
            .ok_or_else(|| Error::RowNotFound(format!("{} row id {}", table, row_id)))
    }

    fn write(&mut self, table: &str, row_id: RowId, record: Record) -> Result<Record> {
        let view = self.txn.view();
        let mut storage = self.storage.write();
        let stored = storage.get_table_mut(table)?;
        let schema = stored.schema().clone();

        let key = match stored.visible(row_id, view) {
            Some(current) => schema.describe_key(current, row_id),
            None => format!("#{}", row_id),
        };
        stored
            .check_writable(row_id, view)
            .map_err(|blocked| Self::blocked_error(table, row_id, key, blocked))?;

        let record = conform_record(&schema, record)?;
        validate_row_constraints(
            &schema,
            &record,
            stored
                .scan(view)
                .filter(move |(id, _)| *id != row_id)
                .map(|(_, r)| r),
        )?;
        if conflicts_on_unique_key(
            &schema,
            &record,
            stored
                .concurrent_rows(view)
                .filter(|(id, _)| *id != row_id)
                .map(|(_, r)| r),
        ) {
            return Err(Error::concurrent_update(table, schema.describe_key(&record, row_id)));
        }

        stored.push_version(row_id, Some(record.clone()), view.txn_id);
        self.txn.record_write(table, row_id);
        Ok(record)
    }

    fn delete(&mut self, table: &str, row_id: RowId) -> Result<()> {
        let view = self.txn.view();
        let mut storage = self.storage.write();
        let stored = storage.get_table_mut(table)?;

        let key = match stored.visible(row_id, view) {
            Some(current) => stored.schema().describe_key(current, row_id),
            None => format!("#{}", row_id),
        };
        stored
            .check_writable(row_id, view)
            .map_err(|blocked| Self::blocked_error(table, row_id, key, blocked))?;

        stored.push_version(row_id, None, view.txn_id);
        self.txn.record_write(table, row_id);
        Ok(())
    }

    fn insert(&mut self, table: &str, record: Record) -> Result<StoredRow> {
        let view = self.txn.view();
        let mut storage = self.storage.write();
        let stored = storage.get_table_mut(table)?;
        let schema = stored.schema().clone();

        let record = conform_record(&schema, record)?;
        validate_row_constraints(&schema, &record, stored.scan(view).map(|(_, r)| r))?;
        if conflicts_on_unique_key(
            &schema,
            &record,
            stored.concurrent_rows(view).map(|(_, r)| r),
        ) {
            return Err(Error::concurrent_update(
                table,
                schema.describe_key(&record, "new row"),
            ));
        }

        let row_id = stored.insert(record.clone(), view.txn_id);
        self.txn.record_write(table, row_id);
        Ok(StoredRow { row_id, record })
    }
}
