use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use debug_print::debug_eprintln;
use mergesql_common::error::{Error, Result};
use mergesql_common::types::{DataType, Value};
use mergesql_ir::{
    CteDefinition, Expr, MergeSource, PlanField, PlanSchema, SourceQuery, SourceRelation,
};
use mergesql_storage::{Record, RowStore};

use super::binding::bind_to_schema;
use super::types::{SourceOrigin, SourceRowId, UnifiedSourceRow};
use crate::ir_evaluator::{IrEvaluator, infer_type};

type RecordStream = Box<dyn Iterator<Item = Result<Record>>>;

/// A resolved relation: its projected schema and a stream over its rows.
struct Relation {
    schema: PlanSchema,
    rows: RecordStream,
}

struct MaterializedCte {
    schema: PlanSchema,
    rows: Rc<[Record]>,
}

/// The `USING` side as one relation: declared schema, one origin per input
/// and the row stream over all inputs in declaration order.
pub struct UnifiedSource {
    pub schema: PlanSchema,
    pub origins: Vec<SourceOrigin>,
    pub rows: Box<dyn Iterator<Item = Result<UnifiedSourceRow>>>,
}

/// Resolves source relations against the store and the statement's CTEs.
/// Base tables are read at resolve time, so later writes by the same
/// statement are never observed by the source.
pub struct SourceUnifier<'a, S: RowStore> {
    store: &'a S,
    ctes: &'a [CteDefinition],
    materialized: HashMap<String, Rc<MaterializedCte>>,
    resolving: Vec<String>,
}

impl<'a, S: RowStore> SourceUnifier<'a, S> {
    pub fn new(store: &'a S, ctes: &'a [CteDefinition]) -> Self {
        Self {
            store,
            ctes,
            materialized: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    pub fn unify(&mut self, source: &MergeSource) -> Result<UnifiedSource> {
        if source.inputs.is_empty() {
            return Err(Error::invalid_query("MERGE source has no inputs"));
        }

        let mut relations = Vec::with_capacity(source.inputs.len());
        for input in &source.inputs {
            relations.push(self.resolve(input)?);
        }

        let declared = match &source.columns {
            Some(columns) => PlanSchema::from_fields(columns.clone()),
            None => PlanSchema::from_fields(
                relations[0]
                    .schema
                    .fields
                    .iter()
                    .map(|f| PlanField {
                        table: None,
                        ..f.clone()
                    })
                    .collect(),
            ),
        };

        let mut origins = Vec::with_capacity(relations.len());
        for (id, (input, relation)) in source.inputs.iter().zip(&relations).enumerate() {
            let origin = SourceOrigin {
                id,
                label: Arc::from(input.label()),
            };
            check_alignment(&declared, &relation.schema, &origin)?;
            origins.push(origin);
        }

        debug_eprintln!(
            "[executor::merge::source] unified {} input(s) into {} columns",
            origins.len(),
            declared.field_count()
        );

        let types: Rc<[DataType]> = declared.fields.iter().map(|f| f.data_type.clone()).collect();
        let rows = relations
            .into_iter()
            .zip(origins.clone())
            .flat_map(move |(relation, origin)| {
                let types = Rc::clone(&types);
                relation.rows.map(move |row| -> Result<(SourceOrigin, Record)> {
                    let record = conform_row(row?, &types, &origin)?;
                    Ok((origin.clone(), record))
                })
            })
            .enumerate()
            .map(|(seq, row)| {
                row.map(|(origin, record)| UnifiedSourceRow {
                    row_id: SourceRowId(seq as u64),
                    origin,
                    record,
                })
            });

        Ok(UnifiedSource {
            schema: declared,
            origins,
            rows: Box::new(rows),
        })
    }

    fn resolve(&mut self, relation: &SourceRelation) -> Result<Relation> {
        match relation {
            SourceRelation::Table { name } if self.cte(name).is_some() => self.resolve_cte(name),
            SourceRelation::Table { name } => self.resolve_table(name),
            SourceRelation::Cte { name } => self.resolve_cte(name),
            SourceRelation::Query(query) => self.resolve_query(query),
            SourceRelation::Values { fields, rows } => resolve_values(fields, rows),
        }
    }

    fn cte(&self, name: &str) -> Option<&'a CteDefinition> {
        self.ctes.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn resolve_table(&mut self, name: &str) -> Result<Relation> {
        let schema = self.store.schema(name)?;
        let plan_schema = PlanSchema::from_fields(
            schema
                .fields()
                .iter()
                .map(|f| PlanField {
                    name: f.name.clone(),
                    data_type: f.data_type.clone(),
                    nullable: f.is_nullable(),
                    table: Some(name.to_string()),
                })
                .collect(),
        );
        let rows = self
            .store
            .scan(name)?
            .map(|row| -> Result<Record> { Ok(row.record) });
        Ok(Relation {
            schema: plan_schema,
            rows: Box::new(rows),
        })
    }

    fn resolve_cte(&mut self, name: &str) -> Result<Relation> {
        let key = name.to_ascii_lowercase();
        let cte = match self.materialized.get(&key) {
            Some(cte) => Rc::clone(cte),
            None => {
                let cte = Rc::new(self.materialize_cte(name)?);
                self.materialized.insert(key, Rc::clone(&cte));
                cte
            }
        };

        let rows = Rc::clone(&cte.rows);
        let stream = (0..rows.len()).map(move |idx| -> Result<Record> { Ok(rows[idx].clone()) });
        Ok(Relation {
            schema: cte.schema.clone(),
            rows: Box::new(stream),
        })
    }

    fn materialize_cte(&mut self, name: &str) -> Result<MaterializedCte> {
        let definition = self
            .cte(name)
            .ok_or_else(|| Error::invalid_query(format!("CTE not found: {}", name)))?;
        if self.resolving.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return Err(Error::invalid_query(format!(
                "CTE {} references itself",
                name
            )));
        }

        self.resolving.push(name.to_string());
        let resolved = self.resolve(&definition.query);
        self.resolving.pop();
        let relation = resolved?;

        let mut fields = relation.schema.fields;
        if let Some(columns) = &definition.columns {
            if columns.len() != fields.len() {
                return Err(Error::schema_mismatch(format!(
                    "CTE {} declares {} columns but its query produces {}",
                    name,
                    columns.len(),
                    fields.len()
                )));
            }
            for (field, column) in fields.iter_mut().zip(columns) {
                field.name = column.clone();
            }
        }
        for field in &mut fields {
            field.table = Some(definition.name.clone());
        }

        let rows: Vec<Record> = relation.rows.collect::<Result<_>>()?;
        debug_eprintln!(
            "[executor::merge::source] materialized CTE {} ({} rows)",
            name,
            rows.len()
        );
        Ok(MaterializedCte {
            schema: PlanSchema::from_fields(fields),
            rows: rows.into(),
        })
    }

    fn resolve_query(&mut self, query: &SourceQuery) -> Result<Relation> {
        let input = self.resolve(&query.from)?;
        let input_schema = input.schema;

        let filter = query
            .filter
            .as_ref()
            .map(|f| bind_to_schema(f, &input_schema))
            .transpose()?;

        let (schema, projection) = match &query.projection {
            Some(items) => {
                let mut fields = Vec::with_capacity(items.len());
                let mut exprs = Vec::with_capacity(items.len());
                for (expr, name) in items {
                    let bound = bind_to_schema(expr, &input_schema)?;
                    fields.push(PlanField::new(name.clone(), infer_type(&bound, &input_schema)));
                    exprs.push(bound);
                }
                (PlanSchema::from_fields(fields), Some(exprs))
            }
            None => (input_schema.clone(), None),
        };

        let rows = input.rows.filter_map(move |row| {
            let record = match row {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };
            let evaluator = IrEvaluator::new(&input_schema);
            if let Some(filter) = &filter {
                match evaluator.evaluate_bool(filter, &record) {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }
            match &projection {
                Some(exprs) => Some(
                    exprs
                        .iter()
                        .map(|e| evaluator.evaluate(e, &record))
                        .collect::<Result<Vec<Value>>>()
                        .map(Record::from_values),
                ),
                None => Some(Ok(record)),
            }
        });

        Ok(Relation {
            schema,
            rows: Box::new(rows),
        })
    }
}

fn resolve_values(fields: &[PlanField], rows: &[Vec<Expr>]) -> Result<Relation> {
    let empty = PlanSchema::new();
    let mut bound_rows = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != fields.len() {
            return Err(Error::schema_mismatch(format!(
                "VALUES row {} has {} values but {} columns are declared",
                idx + 1,
                row.len(),
                fields.len()
            )));
        }
        let bound: Vec<Expr> = row
            .iter()
            .map(|e| bind_to_schema(e, &empty))
            .collect::<Result<_>>()?;
        for (expr, field) in bound.iter().zip(fields) {
            let actual = infer_type(expr, &empty);
            if !actual.is_assignable_to(&field.data_type) {
                return Err(Error::schema_mismatch(format!(
                    "VALUES row {} column {} is {} but {} is declared",
                    idx + 1,
                    field.name,
                    actual,
                    field.data_type
                )));
            }
        }
        bound_rows.push(bound);
    }

    let rows = bound_rows.into_iter().map(|row| {
        let empty = PlanSchema::new();
        let evaluator = IrEvaluator::new(&empty);
        let empty_record = Record::default();
        row.iter()
            .map(|e| evaluator.evaluate(e, &empty_record))
            .collect::<Result<Vec<Value>>>()
            .map(Record::from_values)
    });

    Ok(Relation {
        schema: PlanSchema::from_fields(fields.to_vec()),
        rows: Box::new(rows),
    })
}

fn check_alignment(
    declared: &PlanSchema,
    actual: &PlanSchema,
    origin: &SourceOrigin,
) -> Result<()> {
    if declared.field_count() != actual.field_count() {
        return Err(Error::schema_mismatch(format!(
            "source input {} produces {} columns but the MERGE source declares {}",
            origin,
            actual.field_count(),
            declared.field_count()
        )));
    }
    for (position, (want, have)) in declared.fields.iter().zip(&actual.fields).enumerate() {
        if !have.data_type.is_assignable_to(&want.data_type) {
            return Err(Error::schema_mismatch(format!(
                "source input {} column {} ({}) is {} but {} is declared for {}",
                origin,
                position + 1,
                have.name,
                have.data_type,
                want.data_type,
                want.name
            )));
        }
    }
    Ok(())
}

fn conform_row(record: Record, types: &[DataType], origin: &SourceOrigin) -> Result<Record> {
    let values = record
        .into_values()
        .into_iter()
        .zip(types)
        .map(|(value, data_type)| {
            if !value.data_type().is_assignable_to(data_type) {
                return Err(Error::schema_mismatch(format!(
                    "source input {} produced {} where {} is declared",
                    origin,
                    value.data_type(),
                    data_type
                )));
            }
            Ok(value.coerce_to(data_type))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Record::from_values(values))
}
