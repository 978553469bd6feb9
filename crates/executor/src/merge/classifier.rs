use std::collections::VecDeque;

use debug_print::debug_eprintln;
use mergesql_common::error::{Error, Result};
use mergesql_ir::Expr;
use mergesql_storage::{Schema, StoredRow};

use super::binding::JoinedLayout;
use super::hash_index::TargetHashIndex;
use super::join_predicates::{EquiKey, JoinKeys};
use super::types::{JoinedRow, SourceOrigin, UnifiedSourceRow, joined_record};
use crate::config::{CardinalityCheck, JoinStrategy};
use crate::ir_evaluator::IrEvaluator;

/// Physical matching strategy for one statement.
#[derive(Debug)]
pub enum JoinPlan {
    NestedLoop,
    Hash {
        keys: Vec<EquiKey>,
        index: TargetHashIndex,
    },
}

impl JoinPlan {
    pub fn choose(
        strategy: JoinStrategy,
        join_keys: &JoinKeys,
        targets: &[StoredRow],
        layout: &JoinedLayout,
    ) -> Result<Self> {
        if strategy == JoinStrategy::NestedLoop {
            debug_eprintln!("[executor::merge::classifier] join strategy: nested loop");
            return Ok(JoinPlan::NestedLoop);
        }

        let keys = join_keys.hash_keys();
        if keys.is_empty() {
            debug_eprintln!(
                "[executor::merge::classifier] no hashable equi-join keys ({}), using nested loop",
                strategy.as_str()
            );
            return Ok(JoinPlan::NestedLoop);
        }

        let index = TargetHashIndex::build(targets, keys, layout)?;
        debug_eprintln!(
            "[executor::merge::classifier] join strategy: hash on {} key(s), {} buckets",
            keys.len(),
            index.bucket_count()
        );
        Ok(JoinPlan::Hash {
            keys: keys.to_vec(),
            index,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            JoinPlan::NestedLoop => "nested loop",
            JoinPlan::Hash { .. } => "hash",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MatchTally {
    count: usize,
    origins: Vec<usize>,
}

enum Phase {
    Source,
    UnmatchedTargets { next: usize },
    Done,
}

/// Lazy full outer join of the target snapshot with the unified source.
///
/// Source rows are streamed first, yielding `Matched` once per matching
/// target row and `NotMatchedByTarget` for rows without one. Once the
/// source is exhausted, every target row that never matched is yielded
/// as `NotMatchedBySource`. The sequence is single-pass and stops at the
/// first error.
pub struct RowClassifier<'a, I> {
    source: I,
    targets: Vec<StoredRow>,
    tallies: Vec<MatchTally>,
    on: &'a Expr,
    layout: &'a JoinedLayout,
    plan: JoinPlan,
    cardinality: CardinalityCheck,
    target_schema: &'a Schema,
    origins: &'a [SourceOrigin],
    pending: VecDeque<JoinedRow>,
    phase: Phase,
}

impl<'a, I> RowClassifier<'a, I>
where
    I: Iterator<Item = Result<UnifiedSourceRow>>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: I,
        targets: Vec<StoredRow>,
        on: &'a Expr,
        layout: &'a JoinedLayout,
        plan: JoinPlan,
        cardinality: CardinalityCheck,
        target_schema: &'a Schema,
        origins: &'a [SourceOrigin],
    ) -> Self {
        let tallies = vec![MatchTally::default(); targets.len()];
        Self {
            source,
            targets,
            tallies,
            on,
            layout,
            plan,
            cardinality,
            target_schema,
            origins,
            pending: VecDeque::new(),
            phase: Phase::Source,
        }
    }

    fn classify_source_row(&mut self, row: UnifiedSourceRow) -> Result<()> {
        let evaluator = IrEvaluator::new(self.layout.schema());
        let width = (self.layout.target_width(), self.layout.source_width());

        let candidates: Vec<usize> = match &self.plan {
            JoinPlan::NestedLoop => (0..self.targets.len()).collect(),
            JoinPlan::Hash { keys, index } => index.lookup(&row.record, keys, self.layout)?.to_vec(),
        };

        let mut matched = Vec::new();
        for idx in candidates {
            let joined = joined_record(
                Some(&self.targets[idx].record),
                Some(&row.record),
                width.0,
                width.1,
            );
            if evaluator.evaluate_bool(self.on, &joined)? {
                self.record_match(idx, &row.origin)?;
                matched.push(idx);
            }
        }

        if matched.is_empty() {
            self.pending
                .push_back(JoinedRow::NotMatchedByTarget { source: row });
            return Ok(());
        }

        let last = matched.len() - 1;
        let mut row = Some(row);
        for (pos, idx) in matched.into_iter().enumerate() {
            let source = if pos == last {
                row.take()
            } else {
                row.clone()
            };
            if let Some(source) = source {
                self.pending.push_back(JoinedRow::Matched {
                    target: self.targets[idx].clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    fn record_match(&mut self, target_idx: usize, origin: &SourceOrigin) -> Result<()> {
        let tally = &mut self.tallies[target_idx];
        let violation = match self.cardinality {
            CardinalityCheck::Strict => tally.count > 0,
            CardinalityCheck::PerSourceInput => tally.origins.contains(&origin.id),
        };
        tally.count += 1;
        tally.origins.push(origin.id);

        if violation {
            let target = &self.targets[target_idx];
            let target_key = self.target_schema.describe_key(&target.record, target.row_id);
            let origins = tally
                .origins
                .iter()
                .map(|id| {
                    self.origins
                        .get(*id)
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| format!("s{}", id))
                })
                .collect::<Vec<_>>()
                .join(", ");
            debug_eprintln!(
                "[executor::merge::classifier] cardinality violation on {}: {} matches from {}",
                target_key,
                tally.count,
                origins
            );
            return Err(Error::MergeCardinalityViolation {
                target_key,
                matches: tally.count,
                origins,
            });
        }
        Ok(())
    }

    fn next_unmatched_target(&mut self, next: usize) -> Option<JoinedRow> {
        let found = (next..self.targets.len()).find(|idx| self.tallies[*idx].count == 0);
        match found {
            Some(idx) => {
                self.phase = Phase::UnmatchedTargets { next: idx + 1 };
                Some(JoinedRow::NotMatchedBySource {
                    target: self.targets[idx].clone(),
                })
            }
            None => {
                self.phase = Phase::Done;
                None
            }
        }
    }
}

impl<I> Iterator for RowClassifier<'_, I>
where
    I: Iterator<Item = Result<UnifiedSourceRow>>,
{
    type Item = Result<JoinedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            match self.phase {
                Phase::Source => match self.source.next() {
                    Some(Ok(row)) => {
                        if let Err(e) = self.classify_source_row(row) {
                            self.pending.clear();
                            self.phase = Phase::Done;
                            return Some(Err(e));
                        }
                    }
                    Some(Err(e)) => {
                        self.phase = Phase::Done;
                        return Some(Err(e));
                    }
                    None => self.phase = Phase::UnmatchedTargets { next: 0 },
                },
                Phase::UnmatchedTargets { next } => {
                    return self.next_unmatched_target(next).map(Ok);
                }
                Phase::Done => return None,
            }
        }
    }
}
