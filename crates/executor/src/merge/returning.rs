use mergesql_common::error::{Error, Result};
use mergesql_common::types::Value;
use mergesql_ir::{Expr, ReturningItem};
use mergesql_storage::{Field, Record, Schema, Table};

use super::binding::{BindScope, JoinedLayout};
use super::mutations::AppliedMutation;
use super::types::{MutationKind, joined_record};
use crate::ir_evaluator::{IrEvaluator, infer_type};

#[derive(Debug, Clone, PartialEq)]
pub struct ReturningRow {
    pub action: MutationKind,
    pub values: Vec<Value>,
}

impl ReturningRow {
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }
}

/// Rows produced by `RETURNING`, in the order their writes were applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturningSet {
    schema: Schema,
    rows: Vec<ReturningRow>,
}

impl ReturningSet {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[ReturningRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn actions(&self) -> Vec<MutationKind> {
        self.rows.iter().map(|r| r.action).collect()
    }

    pub fn into_table(self) -> Result<Table> {
        Table::from_values(
            self.schema,
            self.rows.into_iter().map(|r| r.values).collect(),
        )
    }
}

pub struct ReturningCollector<'a> {
    layout: &'a JoinedLayout,
    exprs: Vec<Expr>,
    schema: Schema,
    rows: Vec<ReturningRow>,
    limit: Option<usize>,
}

impl<'a> ReturningCollector<'a> {
    pub fn compile(
        items: &[ReturningItem],
        layout: &'a JoinedLayout,
        limit: Option<usize>,
    ) -> Result<Self> {
        let mut exprs = Vec::new();
        let mut fields = Vec::new();

        for item in items {
            match item {
                ReturningItem::AllTargetColumns => {
                    for (idx, field) in layout
                        .schema()
                        .fields
                        .iter()
                        .take(layout.target_width())
                        .enumerate()
                    {
                        exprs.push(Expr::Column {
                            table: field.table.clone(),
                            name: field.name.clone(),
                            index: Some(idx),
                        });
                        fields.push(Field::nullable(field.name.clone(), field.data_type.clone()));
                    }
                }
                ReturningItem::Expr { expr, alias } => {
                    let bound = layout.bind(expr, BindScope::RETURNING)?;
                    let name = match (alias, expr) {
                        (Some(alias), _) => alias.clone(),
                        (None, Expr::Column { name, .. }) => name.clone(),
                        (None, Expr::MergeAction) => "merge_action".to_string(),
                        (None, _) => "?column?".to_string(),
                    };
                    fields.push(Field::nullable(name, infer_type(&bound, layout.schema())));
                    exprs.push(bound);
                }
            }
        }

        Ok(Self {
            layout,
            exprs,
            schema: Schema::from_fields(fields),
            rows: Vec::new(),
            limit,
        })
    }

    pub fn collect(&mut self, mutation: &AppliedMutation) -> Result<()> {
        if let Some(limit) = self.limit
            && self.rows.len() >= limit
        {
            return Err(Error::invalid_query(format!(
                "MERGE RETURNING exceeded the limit of {} rows",
                limit
            )));
        }

        let joined: Record = joined_record(
            Some(&mutation.record),
            mutation.source.as_ref(),
            self.layout.target_width(),
            self.layout.source_width(),
        );
        let evaluator =
            IrEvaluator::new(self.layout.schema()).with_merge_action(mutation.kind.as_str());
        let values = self
            .exprs
            .iter()
            .map(|e| evaluator.evaluate(e, &joined))
            .collect::<Result<Vec<_>>>()?;

        self.rows.push(ReturningRow {
            action: mutation.kind,
            values,
        });
        Ok(())
    }

    pub fn finish(self) -> ReturningSet {
        ReturningSet {
            schema: self.schema,
            rows: self.rows,
        }
    }
}
