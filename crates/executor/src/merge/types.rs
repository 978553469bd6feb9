use std::fmt;
use std::sync::Arc;

use mergesql_ir::MergeCategory;
use mergesql_storage::{Record, StoredRow};

/// Which source input a unified row was read from. Diagnostic only; all
/// inputs form one relation for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceOrigin {
    pub id: usize,
    pub label: Arc<str>,
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{} ({})", self.id, self.label)
    }
}

/// Statement-scoped identity of a source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceRowId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedSourceRow {
    pub row_id: SourceRowId,
    pub origin: SourceOrigin,
    pub record: Record,
}

/// One classification unit. Exactly the `Matched` variant carries both
/// sides.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinedRow {
    Matched {
        target: StoredRow,
        source: UnifiedSourceRow,
    },
    NotMatchedByTarget {
        source: UnifiedSourceRow,
    },
    NotMatchedBySource {
        target: StoredRow,
    },
}

impl JoinedRow {
    pub fn category(&self) -> MergeCategory {
        match self {
            JoinedRow::Matched { .. } => MergeCategory::Matched,
            JoinedRow::NotMatchedByTarget { .. } => MergeCategory::NotMatchedByTarget,
            JoinedRow::NotMatchedBySource { .. } => MergeCategory::NotMatchedBySource,
        }
    }

    pub fn target(&self) -> Option<&StoredRow> {
        match self {
            JoinedRow::Matched { target, .. } | JoinedRow::NotMatchedBySource { target } => {
                Some(target)
            }
            JoinedRow::NotMatchedByTarget { .. } => None,
        }
    }

    pub fn source(&self) -> Option<&UnifiedSourceRow> {
        match self {
            JoinedRow::Matched { source, .. } | JoinedRow::NotMatchedByTarget { source } => {
                Some(source)
            }
            JoinedRow::NotMatchedBySource { .. } => None,
        }
    }

    /// Lays the row out as target columns then source columns, with the
    /// absent side filled with NULLs.
    pub fn to_record(&self, target_width: usize, source_width: usize) -> Record {
        joined_record(
            self.target().map(|t| &t.record),
            self.source().map(|s| &s.record),
            target_width,
            source_width,
        )
    }
}

pub(crate) fn joined_record(
    target: Option<&Record>,
    source: Option<&Record>,
    target_width: usize,
    source_width: usize,
) -> Record {
    let mut values = Vec::with_capacity(target_width + source_width);
    match target {
        Some(record) => values.extend_from_slice(record.values()),
        None => values.resize(target_width, Default::default()),
    }
    match source {
        Some(record) => values.extend_from_slice(record.values()),
        None => values.resize(target_width + source_width, Default::default()),
    }
    Record::from_values(values)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Inserted,
    Updated,
    Deleted,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Inserted => "INSERTED",
            MutationKind::Updated => "UPDATED",
            MutationKind::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
