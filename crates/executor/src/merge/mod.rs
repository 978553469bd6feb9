mod binding;
mod catalog;
mod classifier;
mod explain;
mod hash_index;
mod join_predicates;
mod mutations;
mod returning;
mod source;
mod types;
mod when_clauses;

use debug_print::debug_eprintln;
use mergesql_common::error::{Error, Result};
use mergesql_ir::{Expr, MergeCategory, MergeStatement};
use mergesql_storage::{Record, RowStore, Schema, StoredRow};

pub use binding::{BindScope, JoinedLayout};
pub use catalog::{BoundAction, CompiledClause, MergeActionCatalog};
pub use classifier::{JoinPlan, RowClassifier};
pub use mutations::{AffectedRowSet, AppliedMutation, MutationExecutor, RowState};
pub use returning::{ReturningCollector, ReturningRow, ReturningSet};
pub use source::{SourceUnifier, UnifiedSource};
pub use types::{JoinedRow, MutationKind, SourceOrigin, SourceRowId, UnifiedSourceRow};
pub use when_clauses::{Selection, select_action};

use self::explain::{ExplainInput, render_plan};
use self::join_predicates::{JoinKeys, analyze_join_keys};
use crate::config::MergeConfig;
use crate::ir_evaluator::IrEvaluator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Classified rows whose selection was `DO NOTHING` or no clause.
    pub skipped: usize,
    pub matched: usize,
    pub not_matched_by_target: usize,
    pub not_matched_by_source: usize,
}

impl MergeStats {
    fn count_category(&mut self, category: MergeCategory) {
        match category {
            MergeCategory::Matched => self.matched += 1,
            MergeCategory::NotMatchedByTarget => self.not_matched_by_target += 1,
            MergeCategory::NotMatchedBySource => self.not_matched_by_source += 1,
        }
    }

    fn count_mutation(&mut self, kind: MutationKind) {
        match kind {
            MutationKind::Inserted => self.inserted += 1,
            MutationKind::Updated => self.updated += 1,
            MutationKind::Deleted => self.deleted += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub rows_affected: usize,
    /// Present exactly when the statement has a `RETURNING` clause.
    pub returning: Option<ReturningSet>,
    pub stats: MergeStats,
}

/// Statement state produced by the compile step. Nothing here has
/// written to the target.
struct PreparedMerge {
    target_schema: Schema,
    source: UnifiedSource,
    layout: JoinedLayout,
    on: Expr,
    join_keys: JoinKeys,
    catalog: MergeActionCatalog,
}

/// Runs `MERGE` statements against a [`RowStore`].
#[derive(Debug, Clone, Default)]
pub struct MergeExecutor {
    config: MergeConfig,
}

impl MergeExecutor {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    fn prepare<S: RowStore>(&self, stmt: &MergeStatement, store: &S) -> Result<PreparedMerge> {
        MergeActionCatalog::validate(&stmt.clauses)?;

        let target_schema = store.schema(&stmt.target)?;
        let source = SourceUnifier::new(store, &stmt.ctes).unify(&stmt.source)?;
        let layout = JoinedLayout::new(
            stmt.target_name(),
            &target_schema,
            &stmt.source.alias,
            &source.schema,
        );
        let on = layout.bind(&stmt.on, BindScope::ON)?;
        let join_keys = analyze_join_keys(&on, &layout)?;
        let catalog = MergeActionCatalog::compile(
            &stmt.clauses,
            stmt.target_name(),
            &target_schema,
            &layout,
        )?;

        Ok(PreparedMerge {
            target_schema,
            source,
            layout,
            on,
            join_keys,
            catalog,
        })
    }

    pub fn execute<S: RowStore>(
        &self,
        stmt: &MergeStatement,
        store: &mut S,
    ) -> Result<MergeOutcome> {
        let PreparedMerge {
            target_schema,
            source,
            layout,
            on,
            join_keys,
            catalog,
        } = self.prepare(stmt, &*store)?;

        let mut returning = stmt
            .returning
            .as_ref()
            .map(|items| {
                ReturningCollector::compile(items, &layout, self.config.max_returning_rows)
            })
            .transpose()?;

        let targets: Vec<StoredRow> = store.scan(&stmt.target)?.collect();
        let plan = JoinPlan::choose(self.config.join_strategy, &join_keys, &targets, &layout)?;
        let classifier = RowClassifier::new(
            source.rows,
            targets,
            &on,
            &layout,
            plan,
            self.config.cardinality,
            &target_schema,
            &source.origins,
        );

        let evaluator = IrEvaluator::new(layout.schema());
        let mut mutator = MutationExecutor::new(store, &stmt.target, &target_schema);
        let mut stats = MergeStats::default();

        for joined in classifier {
            let joined = joined?;
            let category = joined.category();
            stats.count_category(category);

            let record = joined.to_record(layout.target_width(), layout.source_width());
            let clause = match select_action(catalog.clauses_for(category), &evaluator, &record)? {
                Selection::Apply(clause) => clause,
                Selection::DoNothing(_) | Selection::NoMatch => {
                    mutator.skip(joined.target());
                    stats.skipped += 1;
                    continue;
                }
            };

            let applied = apply_clause(&mut mutator, clause, &joined, &record, &evaluator)?;
            stats.count_mutation(applied.kind);
            if let Some(collector) = returning.as_mut() {
                collector.collect(&applied)?;
            }
        }

        let rows_affected = stats.inserted + stats.updated + stats.deleted;
        debug_eprintln!(
            "[executor::merge] {}: {} affected (inserted={}, updated={}, deleted={}, skipped={})",
            stmt.target,
            rows_affected,
            stats.inserted,
            stats.updated,
            stats.deleted,
            stats.skipped
        );

        Ok(MergeOutcome {
            rows_affected,
            returning: returning.map(ReturningCollector::finish),
            stats,
        })
    }

    /// Compiles the statement and describes how it would run, without
    /// writing anything.
    pub fn explain<S: RowStore>(&self, stmt: &MergeStatement, store: &S) -> Result<String> {
        let prepared = self.prepare(stmt, store)?;
        if let Some(items) = &stmt.returning {
            ReturningCollector::compile(items, &prepared.layout, None)?;
        }
        Ok(render_plan(&ExplainInput {
            stmt,
            source_schema: &prepared.source.schema,
            origins: &prepared.source.origins,
            keys: prepared.join_keys.hash_keys(),
            config: &self.config,
            catalog: &prepared.catalog,
        }))
    }
}

fn apply_clause<S: RowStore>(
    mutator: &mut MutationExecutor<'_, S>,
    clause: &CompiledClause,
    joined: &JoinedRow,
    record: &Record,
    evaluator: &IrEvaluator<'_>,
) -> Result<AppliedMutation> {
    let source = joined.source().map(|s| s.record.clone());

    match (&clause.action, joined.target()) {
        (BoundAction::Update { assignments }, Some(target)) => {
            let mut values = target.record.clone();
            for (idx, expr) in assignments {
                values.set(*idx, evaluator.evaluate(expr, record)?);
            }
            mutator.update(target, values, source, clause.ordinal)
        }
        (BoundAction::Delete, Some(target)) => mutator.delete(target, source, clause.ordinal),
        (BoundAction::Insert { values }, None) => {
            let values = values
                .iter()
                .map(|e| evaluator.evaluate(e, record))
                .collect::<Result<Vec<_>>>()?;
            mutator.insert(Record::from_values(values), source, clause.ordinal)
        }
        (action, _) => Err(Error::internal(format!(
            "{} action selected for a {} row",
            action.name(),
            clause.category
        ))),
    }
}
