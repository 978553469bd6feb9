use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Record, Schema};

pub type TxnId = u64;
pub type Timestamp = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What one transaction can see: its own writes plus everything committed
/// at or before `snapshot_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotView {
    pub txn_id: TxnId,
    pub snapshot_ts: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowVersion {
    /// `None` marks a deletion.
    pub data: Option<Record>,
    pub created_by: TxnId,
    pub commit_ts: Option<Timestamp>,
}

impl RowVersion {
    fn visible_to(&self, view: SnapshotView) -> bool {
        self.created_by == view.txn_id || self.commit_ts.is_some_and(|ts| ts <= view.snapshot_ts)
    }

    /// Written by another transaction that had not committed by the
    /// snapshot, so `view` can neither see nor overwrite it.
    fn is_concurrent_with(&self, view: SnapshotView) -> bool {
        self.created_by != view.txn_id && self.commit_ts.is_none_or(|ts| ts > view.snapshot_ts)
    }

    fn is_pending_for(&self, txn_id: TxnId) -> bool {
        self.created_by == txn_id && self.commit_ts.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBlocked {
    /// Another transaction holds an uncommitted version, or committed one
    /// after the writer's snapshot.
    Conflict,
    Missing,
}

/// A stored table: each row is a chain of versions, oldest first.
#[derive(Debug, Clone)]
pub struct VersionedTable {
    schema: Schema,
    chains: BTreeMap<RowId, Vec<RowVersion>>,
    next_row_id: u64,
}

impl VersionedTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            chains: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn version_count(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    pub fn visible(&self, row_id: RowId, view: SnapshotView) -> Option<&Record> {
        self.chains
            .get(&row_id)?
            .iter()
            .rev()
            .find(|v| v.visible_to(view))?
            .data
            .as_ref()
    }

    pub fn scan(&self, view: SnapshotView) -> impl Iterator<Item = (RowId, &Record)> + Clone {
        self.chains.iter().filter_map(move |(row_id, chain)| {
            chain
                .iter()
                .rev()
                .find(|v| v.visible_to(view))
                .and_then(|v| v.data.as_ref())
                .map(|record| (*row_id, record))
        })
    }

    pub fn check_writable(
        &self,
        row_id: RowId,
        view: SnapshotView,
    ) -> Result<(), WriteBlocked> {
        let newest = self
            .chains
            .get(&row_id)
            .and_then(|chain| chain.last())
            .ok_or(WriteBlocked::Missing)?;

        if newest.is_concurrent_with(view) {
            return Err(WriteBlocked::Conflict);
        }
        if newest.data.is_none() {
            return Err(WriteBlocked::Missing);
        }
        Ok(())
    }

    /// Live row values written by concurrent transactions, which `scan`
    /// hides from `view`.
    pub fn concurrent_rows(
        &self,
        view: SnapshotView,
    ) -> impl Iterator<Item = (RowId, &Record)> + Clone {
        self.chains.iter().filter_map(move |(row_id, chain)| {
            chain
                .last()
                .filter(|newest| newest.is_concurrent_with(view))
                .and_then(|newest| newest.data.as_ref())
                .map(|record| (*row_id, record))
        })
    }

    pub fn push_version(&mut self, row_id: RowId, data: Option<Record>, txn_id: TxnId) {
        self.chains.entry(row_id).or_default().push(RowVersion {
            data,
            created_by: txn_id,
            commit_ts: None,
        });
    }

    pub fn insert(&mut self, record: Record, txn_id: TxnId) -> RowId {
        let row_id = RowId(self.next_row_id);
        self.next_row_id += 1;
        self.push_version(row_id, Some(record), txn_id);
        row_id
    }

    pub fn stamp_commit(&mut self, row_id: RowId, txn_id: TxnId, commit_ts: Timestamp) {
        if let Some(chain) = self.chains.get_mut(&row_id) {
            for version in chain.iter_mut().filter(|v| v.is_pending_for(txn_id)) {
                version.commit_ts = Some(commit_ts);
            }
        }
    }

    /// Removes the newest version if it is an uncommitted write of `txn_id`.
    pub fn undo_latest(&mut self, row_id: RowId, txn_id: TxnId) {
        let Some(chain) = self.chains.get_mut(&row_id) else {
            return;
        };
        if chain.last().is_some_and(|v| v.is_pending_for(txn_id)) {
            chain.pop();
        }
        if chain.is_empty() {
            self.chains.remove(&row_id);
        }
    }

    /// Drops versions no snapshot at or after `horizon` can reach. Returns
    /// how many versions were removed.
    pub fn vacuum(&mut self, horizon: Timestamp) -> usize {
        let mut removed = 0;
        self.chains.retain(|_, chain| {
            let base = chain
                .iter()
                .rposition(|v| v.commit_ts.is_some_and(|ts| ts <= horizon));
            if let Some(base) = base {
                removed += base;
                chain.drain(..base);
                if chain.len() == 1 && chain[0].data.is_none() {
                    removed += 1;
                    return false;
                }
            }
            true
        });
        removed
    }
}
