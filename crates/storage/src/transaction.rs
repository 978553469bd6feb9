use std::collections::HashMap;

use mergesql_common::error::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::mvcc::{RowId, SnapshotView, Timestamp, TxnId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Each statement reads from a fresh snapshot.
    #[default]
    ReadCommitted,
    /// Every statement reads from the snapshot taken at `BEGIN`.
    RepeatableRead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntry {
    pub table: String,
    pub row_id: RowId,
}

#[derive(Debug, Clone)]
pub struct Savepoint {
    pub name: String,
    log_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionStatus {
    Active,
    Aborted,
}

/// Session-side transaction state. Every version this transaction pushes
/// is recorded in `write_log` so it can be stamped or undone later.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub txn_id: TxnId,
    pub snapshot_ts: Timestamp,
    pub isolation_level: IsolationLevel,
    write_log: Vec<WriteEntry>,
    savepoints: Vec<Savepoint>,
    status: TransactionStatus,
}

impl Transaction {
    fn new(txn_id: TxnId, snapshot_ts: Timestamp, isolation_level: IsolationLevel) -> Self {
        Self {
            txn_id,
            snapshot_ts,
            isolation_level,
            write_log: Vec::new(),
            savepoints: Vec::new(),
            status: TransactionStatus::Active,
        }
    }

    pub fn view(&self) -> SnapshotView {
        SnapshotView {
            txn_id: self.txn_id,
            snapshot_ts: self.snapshot_ts,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.status == TransactionStatus::Aborted
    }

    pub fn mark_aborted(&mut self) {
        self.status = TransactionStatus::Aborted;
    }

    pub fn mark_active(&mut self) {
        self.status = TransactionStatus::Active;
    }

    pub fn record_write(&mut self, table: &str, row_id: RowId) {
        self.write_log.push(WriteEntry {
            table: table.to_string(),
            row_id,
        });
    }

    pub fn write_log(&self) -> &[WriteEntry] {
        &self.write_log
    }

    pub fn has_written(&self) -> bool {
        !self.write_log.is_empty()
    }

    pub fn savepoints(&self) -> &[Savepoint] {
        &self.savepoints
    }

    pub fn create_savepoint(&mut self, name: String) {
        self.savepoints.retain(|sp| sp.name != name);
        self.savepoints.push(Savepoint {
            name,
            log_len: self.write_log.len(),
        });
    }

    /// Forgets every write made after the named savepoint and returns them,
    /// newest first. The savepoint itself stays defined.
    pub(crate) fn take_writes_since(&mut self, name: &str) -> Result<Vec<WriteEntry>> {
        let sp_idx = self
            .savepoints
            .iter()
            .rposition(|sp| sp.name == name)
            .ok_or_else(|| Error::SavepointNotFound {
                name: name.to_string(),
            })?;

        let log_len = self.savepoints[sp_idx].log_len;
        self.savepoints.truncate(sp_idx + 1);
        let mut undone = self.write_log.split_off(log_len);
        undone.reverse();
        Ok(undone)
    }

    pub(crate) fn into_write_log(self) -> Vec<WriteEntry> {
        self.write_log
    }
}

#[derive(Debug)]
pub struct TransactionManager {
    next_txn_id: TxnId,
    global_timestamp: Timestamp,
    default_isolation_level: IsolationLevel,
    active: HashMap<TxnId, Timestamp>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_txn_id: 1,
            global_timestamp: 0,
            default_isolation_level: IsolationLevel::default(),
            active: HashMap::new(),
        }
    }

    pub fn default_isolation_level(&self) -> IsolationLevel {
        self.default_isolation_level
    }

    pub fn set_default_isolation_level(&mut self, level: IsolationLevel) {
        self.default_isolation_level = level;
    }

    pub fn current_timestamp(&self) -> Timestamp {
        self.global_timestamp
    }

    pub fn begin(&mut self, isolation_level: IsolationLevel) -> Transaction {
        let txn_id = self.next_txn_id;
        self.next_txn_id += 1;
        self.active.insert(txn_id, self.global_timestamp);
        Transaction::new(txn_id, self.global_timestamp, isolation_level)
    }

    /// Moves a read-committed transaction's snapshot forward to now.
    pub fn refresh_snapshot(&mut self, txn: &mut Transaction) {
        if txn.isolation_level == IsolationLevel::ReadCommitted {
            txn.snapshot_ts = self.global_timestamp;
            self.active.insert(txn.txn_id, txn.snapshot_ts);
        }
    }

    pub(crate) fn allocate_commit(&mut self, txn_id: TxnId) -> Timestamp {
        self.global_timestamp += 1;
        let ts = self.global_timestamp;
        self.active.remove(&txn_id);
        ts
    }

    pub(crate) fn end(&mut self, txn_id: TxnId) {
        self.active.remove(&txn_id);
    }

    pub fn is_active(&self, txn_id: TxnId) -> bool {
        self.active.contains_key(&txn_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Oldest snapshot any running transaction may still read from.
    pub fn horizon(&self) -> Timestamp {
        self.active
            .values()
            .copied()
            .min()
            .unwrap_or(self.global_timestamp)
    }
}
