use debug_print::debug_eprintln;
use mergesql_common::error::{Error, Result};
use mergesql_common::types::Value;
use mergesql_ir::MergeStatement;
use mergesql_storage::{
    IsolationLevel, Record, RowStore, SharedStorage, Table, Transaction, TransactionalStore,
};

use crate::config::MergeConfig;
use crate::merge::{MergeExecutor, MergeOutcome};

/// One client session over shared storage.
///
/// Statements outside `begin()`/`commit()` run in their own implicit
/// transaction: committed on success, rolled back on any error. Inside an
/// explicit transaction a failed statement aborts the transaction, and
/// every later statement fails until `rollback()` (or a rollback to a
/// savepoint taken before the failure).
pub struct QueryExecutor {
    storage: SharedStorage,
    config: MergeConfig,
    transaction: Option<Transaction>,
}

impl QueryExecutor {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            config: MergeConfig::default(),
            transaction: None,
        }
    }

    pub fn with_config(mut self, config: MergeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: MergeConfig) {
        self.config = config;
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn begin(&mut self) -> Result<()> {
        self.begin_transaction(None)
    }

    pub fn begin_with_isolation(&mut self, level: IsolationLevel) -> Result<()> {
        self.begin_transaction(Some(level))
    }

    fn begin_transaction(&mut self, level: Option<IsolationLevel>) -> Result<()> {
        if self.transaction.is_some() {
            return Err(Error::ActiveSqlTransaction {
                operation: "BEGIN".to_string(),
            });
        }
        let txn = self.storage.write().begin(level);
        debug_eprintln!(
            "[executor::session] BEGIN txn {} ({:?})",
            txn.txn_id,
            txn.isolation_level
        );
        self.transaction = Some(txn);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        let txn = self.transaction.take().ok_or_else(|| Error::NoActiveTransaction {
            operation: "COMMIT".to_string(),
        })?;
        self.storage.write().commit(txn)?;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        let txn = self.transaction.take().ok_or_else(|| Error::NoActiveTransaction {
            operation: "ROLLBACK".to_string(),
        })?;
        self.storage.write().rollback(txn);
        Ok(())
    }

    pub fn savepoint(&mut self, name: &str) -> Result<()> {
        let txn = self.active_transaction("SAVEPOINT")?;
        if txn.is_aborted() {
            return Err(Error::TransactionAborted {
                operation: "SAVEPOINT".to_string(),
            });
        }
        txn.create_savepoint(name.to_string());
        Ok(())
    }

    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let storage = self.storage.clone();
        let txn = self.active_transaction("ROLLBACK TO SAVEPOINT")?;
        storage.write().rollback_to_savepoint(txn, name)
    }

    fn active_transaction(&mut self, operation: &str) -> Result<&mut Transaction> {
        self.transaction
            .as_mut()
            .ok_or_else(|| Error::NoActiveTransaction {
                operation: operation.to_string(),
            })
    }

    pub fn execute_merge(&mut self, stmt: &MergeStatement) -> Result<MergeOutcome> {
        let executor = MergeExecutor::new(self.config.clone());
        self.run_in_transaction("MERGE", |store| executor.execute(stmt, store))
    }

    pub fn explain_merge(&mut self, stmt: &MergeStatement) -> Result<String> {
        let executor = MergeExecutor::new(self.config.clone());
        self.run_in_transaction("EXPLAIN", |store| executor.explain(stmt, &*store))
    }

    pub fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Value>>) -> Result<usize> {
        self.run_in_transaction("INSERT", |store| {
            let count = rows.len();
            for row in rows {
                store.insert(table, Record::from_values(row))?;
            }
            Ok(count)
        })
    }

    /// Rows of `table` visible to this session: committed rows, plus the
    /// open transaction's own writes.
    pub fn scan_table(&mut self, table: &str) -> Result<Table> {
        self.run_in_transaction("SELECT", |store| {
            let schema = store.schema(table)?;
            let rows = store.scan(table)?.map(|row| row.record).collect();
            Table::from_records(schema, rows)
        })
    }

    fn run_in_transaction<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut TransactionalStore<'_>) -> Result<T>,
    ) -> Result<T> {
        match self.transaction.as_mut() {
            Some(txn) => {
                if txn.is_aborted() {
                    return Err(Error::TransactionAborted {
                        operation: operation.to_string(),
                    });
                }
                self.storage.write().refresh_snapshot(txn);
                let result = f(&mut TransactionalStore::new(&self.storage, txn));
                if let Err(e) = &result {
                    debug_eprintln!(
                        "[executor::session] {} failed, aborting txn {}: {}",
                        operation,
                        txn.txn_id,
                        e
                    );
                    txn.mark_aborted();
                }
                result
            }
            None => {
                let mut txn = self.storage.write().begin(None);
                let result = f(&mut TransactionalStore::new(&self.storage, &mut txn));
                match result {
                    Ok(value) => {
                        self.storage.write().commit(txn)?;
                        Ok(value)
                    }
                    Err(e) => {
                        debug_eprintln!(
                            "[executor::session] {} failed, rolling back implicit txn {}: {}",
                            operation,
                            txn.txn_id,
                            e
                        );
                        self.storage.write().rollback(txn);
                        Err(e)
                    }
                }
            }
        }
    }
}
