//! Storage engine and transaction management for mergesql.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod constraints;
pub mod mvcc;
pub mod record;
pub mod row_store;
pub mod schema;
pub mod table;
pub mod transaction;

use std::sync::Arc;

pub use constraints::{conflicts_on_unique_key, conform_record, validate_row_constraints};
use debug_print::debug_eprintln;
use indexmap::IndexMap;
use mergesql_common::error::{Error, Result};
pub use mvcc::{RowId, RowVersion, SnapshotView, Timestamp, TxnId, VersionedTable, WriteBlocked};
use parking_lot::RwLock;
pub use record::Record;
pub use row_store::{RowScan, RowStore, StoredRow, TransactionalStore};
pub use schema::{Field, FieldMode, Schema};
pub use table::Table;
pub use transaction::{IsolationLevel, Savepoint, Transaction, TransactionManager, WriteEntry};

pub type SharedStorage = Arc<RwLock<Storage>>;

#[derive(Debug, Default)]
pub struct Storage {
    tables: IndexMap<String, VersionedTable>,
    transactions: TransactionManager,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedStorage {
        Arc::new(RwLock::new(self))
    }

    pub fn create_table(&mut self, table_name: &str, schema: Schema) -> Result<()> {
        let key = table_name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            return Err(Error::invalid_query(format!(
                "Table already exists: {}",
                table_name
            )));
        }
        self.tables.insert(key, VersionedTable::new(schema));
        Ok(())
    }

    pub fn drop_table(&mut self, table_name: &str) -> Result<()> {
        self.tables
            .shift_remove(&table_name.to_ascii_lowercase())
            .map(|_| ())
            .ok_or_else(|| Error::table_not_found(table_name))
    }

    pub fn get_table(&self, table_name: &str) -> Result<&VersionedTable> {
        self.tables
            .get(&table_name.to_ascii_lowercase())
            .ok_or_else(|| Error::table_not_found(table_name))
    }

    pub fn get_table_mut(&mut self, table_name: &str) -> Result<&mut VersionedTable> {
        self.tables
            .get_mut(&table_name.to_ascii_lowercase())
            .ok_or_else(|| Error::table_not_found(table_name))
    }

    pub fn has_table(&self, table_name: &str) -> bool {
        self.tables.contains_key(&table_name.to_ascii_lowercase())
    }

    pub fn table_names(&self) -> Vec<&String> {
        self.tables.keys().collect()
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn transactions_mut(&mut self) -> &mut TransactionManager {
        &mut self.transactions
    }

    pub fn begin(&mut self, isolation_level: Option<IsolationLevel>) -> Transaction {
        let level = isolation_level.unwrap_or(self.transactions.default_isolation_level());
        let txn = self.transactions.begin(level);
        debug_eprintln!(
            "[storage::transaction] begin txn {} at snapshot {}",
            txn.txn_id,
            txn.snapshot_ts
        );
        txn
    }

    pub fn refresh_snapshot(&mut self, txn: &mut Transaction) {
        self.transactions.refresh_snapshot(txn);
    }

    /// Stamps every version the transaction wrote with a fresh commit
    /// timestamp, making them visible to later snapshots.
    pub fn commit(&mut self, txn: Transaction) -> Result<Timestamp> {
        let txn_id = txn.txn_id;
        if txn.is_aborted() {
            self.rollback(txn);
            return Err(Error::TransactionAborted {
                operation: "COMMIT".to_string(),
            });
        }

        let commit_ts = self.transactions.allocate_commit(txn_id);
        let log = txn.into_write_log();
        for entry in &log {
            if let Ok(table) = self.get_table_mut(&entry.table) {
                table.stamp_commit(entry.row_id, txn_id, commit_ts);
            }
        }
        debug_eprintln!(
            "[storage::transaction] commit txn {} at {} ({} writes)",
            txn_id,
            commit_ts,
            log.len()
        );
        Ok(commit_ts)
    }

    pub fn rollback(&mut self, txn: Transaction) {
        let txn_id = txn.txn_id;
        let mut log = txn.into_write_log();
        log.reverse();
        self.undo_writes(txn_id, &log);
        self.transactions.end(txn_id);
        debug_eprintln!(
            "[storage::transaction] rollback txn {} ({} writes undone)",
            txn_id,
            log.len()
        );
    }

    pub fn rollback_to_savepoint(&mut self, txn: &mut Transaction, name: &str) -> Result<()> {
        let undone = txn.take_writes_since(name)?;
        self.undo_writes(txn.txn_id, &undone);
        txn.mark_active();
        Ok(())
    }

    fn undo_writes(&mut self, txn_id: TxnId, newest_first: &[WriteEntry]) {
        for entry in newest_first {
            if let Ok(table) = self.get_table_mut(&entry.table) {
                table.undo_latest(entry.row_id, txn_id);
            }
        }
    }

    /// Prunes versions no running transaction can still see.
    pub fn vacuum(&mut self) -> usize {
        let horizon = self.transactions.horizon();
        let removed: usize = self
            .tables
            .values_mut()
            .map(|table| table.vacuum(horizon))
            .sum();
        debug_eprintln!(
            "[storage::vacuum] removed {} versions at horizon {}",
            removed,
            horizon
        );
        removed
    }

    /// Rows visible to a snapshot taken now, outside any transaction.
    pub fn committed_rows(&self, table_name: &str) -> Result<Table> {
        let view = SnapshotView {
            txn_id: 0,
            snapshot_ts: self.transactions.current_timestamp(),
        };
        self.visible_rows(table_name, view)
    }

    pub fn visible_rows(&self, table_name: &str, view: SnapshotView) -> Result<Table> {
        let table = self.get_table(table_name)?;
        let rows = table.scan(view).map(|(_, r)| r.clone()).collect();
        Table::from_records(table.schema().clone(), rows)
    }
}
