use std::collections::HashMap;

use mergesql_common::error::Result;
use mergesql_common::types::Value;
use mergesql_storage::{Record, StoredRow};

use super::binding::JoinedLayout;
use super::join_predicates::EquiKey;
use super::types::joined_record;
use crate::ir_evaluator::IrEvaluator;

/// Target snapshot positions bucketed by their equi-key values.
#[derive(Debug, Default)]
pub struct TargetHashIndex {
    buckets: HashMap<Vec<Value>, Vec<usize>>,
}

impl TargetHashIndex {
    /// Rows with a NULL key are left out; NULL never compares equal.
    pub fn build(targets: &[StoredRow], keys: &[EquiKey], layout: &JoinedLayout) -> Result<Self> {
        let evaluator = IrEvaluator::new(layout.schema());
        let mut buckets: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();

        for (idx, target) in targets.iter().enumerate() {
            let probe = joined_record(
                Some(&target.record),
                None,
                layout.target_width(),
                layout.source_width(),
            );
            if let Some(key) = key_values(keys.iter().map(|k| &k.target), &evaluator, &probe)? {
                buckets.entry(key).or_default().push(idx);
            }
        }

        Ok(Self { buckets })
    }

    /// Candidate target positions for a source row, in snapshot order.
    pub fn lookup(
        &self,
        source: &Record,
        keys: &[EquiKey],
        layout: &JoinedLayout,
    ) -> Result<&[usize]> {
        let evaluator = IrEvaluator::new(layout.schema());
        let probe = joined_record(
            None,
            Some(source),
            layout.target_width(),
            layout.source_width(),
        );
        Ok(
            match key_values(keys.iter().map(|k| &k.source), &evaluator, &probe)? {
                Some(key) => self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[]),
                None => &[],
            },
        )
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

fn key_values<'e>(
    exprs: impl Iterator<Item = &'e mergesql_ir::Expr>,
    evaluator: &IrEvaluator<'_>,
    record: &Record,
) -> Result<Option<Vec<Value>>> {
    let mut key = Vec::new();
    for expr in exprs {
        let value = evaluator.evaluate(expr, record)?;
        if value.is_null() {
            return Ok(None);
        }
        key.push(value.join_key());
    }
    Ok(Some(key))
}
