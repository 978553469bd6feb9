use debug_print::debug_eprintln;
use indexmap::IndexMap;
use mergesql_common::error::{Error, Result};
use mergesql_storage::{Record, RowId, RowStore, Schema, StoredRow};

use super::types::MutationKind;

/// Per-target-row progress within one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    #[default]
    Untouched,
    Selected,
    Applied,
    Skipped,
    Conflicted,
}

/// Target rows this statement has touched. A row that reached `Applied`
/// stays there; a second data-changing action on it is rejected.
#[derive(Debug, Default)]
pub struct AffectedRowSet {
    states: IndexMap<RowId, RowState>,
}

impl AffectedRowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, row_id: RowId) -> RowState {
        self.states.get(&row_id).copied().unwrap_or_default()
    }

    pub fn contains(&self, row_id: RowId) -> bool {
        self.state(row_id) == RowState::Applied
    }

    pub fn applied_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == RowState::Applied)
            .count()
    }

    /// Moves the row to `Selected`, failing if it was already changed by
    /// this statement.
    pub fn check_and_mark(
        &mut self,
        row_id: RowId,
        target_key: impl FnOnce() -> String,
    ) -> Result<()> {
        let state = self.states.entry(row_id).or_default();
        if *state == RowState::Applied {
            return Err(Error::DoubleMatchViolation {
                target_key: target_key(),
            });
        }
        *state = RowState::Selected;
        Ok(())
    }

    fn finish(&mut self, row_id: RowId, state: RowState) {
        self.states.insert(row_id, state);
    }

    /// Records that a row was classified but no action changed it. Never
    /// downgrades an applied row.
    pub fn mark_skipped(&mut self, row_id: RowId) {
        let state = self.states.entry(row_id).or_default();
        if *state != RowState::Applied {
            *state = RowState::Skipped;
        }
    }
}

/// A write that reached `Applied`, with the values `RETURNING` reads:
/// post-image for inserts and updates, pre-image for deletes.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMutation {
    pub kind: MutationKind,
    pub row_id: RowId,
    pub record: Record,
    pub source: Option<Record>,
    /// Clause that produced the write.
    pub ordinal: usize,
}

/// Applies selected actions to the target through the row store.
pub struct MutationExecutor<'s, S: RowStore> {
    store: &'s mut S,
    table: &'s str,
    schema: &'s Schema,
    affected: AffectedRowSet,
}

impl<'s, S: RowStore> MutationExecutor<'s, S> {
    pub fn new(store: &'s mut S, table: &'s str, schema: &'s Schema) -> Self {
        Self {
            store,
            table,
            schema,
            affected: AffectedRowSet::new(),
        }
    }

    pub fn affected(&self) -> &AffectedRowSet {
        &self.affected
    }

    fn describe(&self, target: &StoredRow) -> String {
        self.schema.describe_key(&target.record, target.row_id)
    }

    pub fn update(
        &mut self,
        target: &StoredRow,
        values: Record,
        source: Option<Record>,
        ordinal: usize,
    ) -> Result<AppliedMutation> {
        let key = self.describe(target);
        self.affected.check_and_mark(target.row_id, || key.clone())?;

        let stored = self
            .store
            .write(self.table, target.row_id, values)
            .inspect_err(|e| self.fail(target.row_id, e))?;
        self.affected.finish(target.row_id, RowState::Applied);
        debug_eprintln!(
            "[executor::merge::mutations] clause {} updated {} row {}",
            ordinal,
            self.table,
            key
        );

        Ok(AppliedMutation {
            kind: MutationKind::Updated,
            row_id: target.row_id,
            record: stored,
            source,
            ordinal,
        })
    }

    pub fn delete(
        &mut self,
        target: &StoredRow,
        source: Option<Record>,
        ordinal: usize,
    ) -> Result<AppliedMutation> {
        let key = self.describe(target);
        self.affected.check_and_mark(target.row_id, || key.clone())?;

        let result = self
            .store
            .read_current(self.table, target.row_id)
            .and_then(|pre_image| {
                self.store.delete(self.table, target.row_id)?;
                Ok(pre_image)
            });
        let pre_image = result.inspect_err(|e| self.fail(target.row_id, e))?;
        self.affected.finish(target.row_id, RowState::Applied);
        debug_eprintln!(
            "[executor::merge::mutations] clause {} deleted {} row {}",
            ordinal,
            self.table,
            key
        );

        Ok(AppliedMutation {
            kind: MutationKind::Deleted,
            row_id: target.row_id,
            record: pre_image,
            source,
            ordinal,
        })
    }

    /// Inserts create a new row identity, so the affected-row check does
    /// not apply.
    pub fn insert(
        &mut self,
        values: Record,
        source: Option<Record>,
        ordinal: usize,
    ) -> Result<AppliedMutation> {
        let stored = self.store.insert(self.table, values)?;
        debug_eprintln!(
            "[executor::merge::mutations] clause {} inserted into {} as row {}",
            ordinal,
            self.table,
            stored.row_id
        );

        Ok(AppliedMutation {
            kind: MutationKind::Inserted,
            row_id: stored.row_id,
            record: stored.record,
            source,
            ordinal,
        })
    }

    pub fn skip(&mut self, target: Option<&StoredRow>) {
        if let Some(target) = target {
            self.affected.mark_skipped(target.row_id);
        }
    }

    fn fail(&mut self, row_id: RowId, error: &Error) {
        let state = match error {
            Error::ConcurrentUpdateConflict { .. } => RowState::Conflicted,
            _ => RowState::Untouched,
        };
        self.affected.finish(row_id, state);
    }
}
