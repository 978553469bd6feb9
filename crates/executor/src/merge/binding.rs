use mergesql_common::error::{Error, Result};
use mergesql_ir::{Expr, MergeCategory, PlanField, PlanSchema};
use mergesql_storage::Schema;

/// Which sides of the joined row an expression may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindScope {
    pub target: bool,
    pub source: bool,
    pub merge_action: bool,
    context: &'static str,
}

impl BindScope {
    pub const ON: BindScope = BindScope {
        target: true,
        source: true,
        merge_action: false,
        context: "ON condition",
    };

    pub const RETURNING: BindScope = BindScope {
        target: true,
        source: true,
        merge_action: true,
        context: "RETURNING",
    };

    pub fn for_category(category: MergeCategory) -> Self {
        match category {
            MergeCategory::Matched => BindScope {
                target: true,
                source: true,
                merge_action: false,
                context: "WHEN MATCHED",
            },
            MergeCategory::NotMatchedByTarget => BindScope {
                target: false,
                source: true,
                merge_action: false,
                context: "WHEN NOT MATCHED BY TARGET",
            },
            MergeCategory::NotMatchedBySource => BindScope {
                target: true,
                source: false,
                merge_action: false,
                context: "WHEN NOT MATCHED BY SOURCE",
            },
        }
    }
}

/// Column layout of a joined row: target columns qualified by the target
/// name (or alias), then source columns qualified by the source alias.
#[derive(Debug, Clone)]
pub struct JoinedLayout {
    schema: PlanSchema,
    target_width: usize,
    source_width: usize,
}

impl JoinedLayout {
    pub fn new(
        target_name: &str,
        target_schema: &Schema,
        source_alias: &str,
        source_schema: &PlanSchema,
    ) -> Self {
        let target_fields = target_schema.fields().iter().map(|f| PlanField {
            name: f.name.clone(),
            data_type: f.data_type.clone(),
            nullable: f.is_nullable(),
            table: Some(target_name.to_string()),
        });
        let source_fields = source_schema
            .fields
            .iter()
            .map(|f| f.clone().with_table(source_alias));

        Self {
            schema: PlanSchema::from_fields(target_fields.chain(source_fields).collect()),
            target_width: target_schema.field_count(),
            source_width: source_schema.field_count(),
        }
    }

    pub fn schema(&self) -> &PlanSchema {
        &self.schema
    }

    pub fn target_width(&self) -> usize {
        self.target_width
    }

    pub fn source_width(&self) -> usize {
        self.source_width
    }

    pub fn is_target_index(&self, index: usize) -> bool {
        index < self.target_width
    }

    /// Resolves every column reference in `expr` to a joined-row index and
    /// checks the references against `scope`.
    pub fn bind(&self, expr: &Expr, scope: BindScope) -> Result<Expr> {
        if !scope.merge_action && expr.contains_merge_action() {
            return Err(Error::invalid_query(format!(
                "merge_action() is not allowed in {}",
                scope.context
            )));
        }

        let mut bound = expr.clone();
        bound.try_map_columns(&mut |table, name, index| {
            let idx = resolve_column(&self.schema, table.as_deref(), name)?;
            if self.is_target_index(idx) && !scope.target {
                return Err(Error::invalid_query(format!(
                    "{} cannot reference target column {}",
                    scope.context,
                    display_name(table.as_deref(), name)
                )));
            }
            if !self.is_target_index(idx) && !scope.source {
                return Err(Error::invalid_query(format!(
                    "{} cannot reference source column {}",
                    scope.context,
                    display_name(table.as_deref(), name)
                )));
            }
            *index = Some(idx);
            Ok(())
        })?;
        Ok(bound)
    }
}

/// Binds `expr` against a single relation, as used by source subqueries.
pub fn bind_to_schema(expr: &Expr, schema: &PlanSchema) -> Result<Expr> {
    if expr.contains_merge_action() {
        return Err(Error::invalid_query(
            "merge_action() is only valid in MERGE ... RETURNING",
        ));
    }
    let mut bound = expr.clone();
    bound.try_map_columns(&mut |table, name, index| {
        *index = Some(resolve_column(schema, table.as_deref(), name)?);
        Ok(())
    })?;
    Ok(bound)
}

fn resolve_column(schema: &PlanSchema, table: Option<&str>, name: &str) -> Result<usize> {
    let candidates = schema.matching_indices(name, table);
    match candidates.as_slice() {
        [] => Err(Error::column_not_found(display_name(table, name))),
        [idx] => Ok(*idx),
        many => {
            let mut tables: Vec<&str> = many
                .iter()
                .filter_map(|idx| schema.fields[*idx].table.as_deref())
                .collect();
            tables.dedup();
            Err(Error::AmbiguousColumn {
                column: display_name(table, name),
                tables: tables.join(", "),
            })
        }
    }
}

fn display_name(table: Option<&str>, name: &str) -> String {
    match table {
        Some(t) => format!("{}.{}", t, name),
        None => name.to_string(),
    }
}
