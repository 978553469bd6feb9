//! mergesql - an in-memory engine for extended SQL `MERGE`.
//!
//! A statement combines one or more source inputs into a single source
//! relation, classifies every source and target row into one of three
//! categories (matched, not matched by target, not matched by source), picks
//! the first `WHEN` clause whose condition holds for each row and applies
//! its action atomically. `RETURNING` reports the affected rows together
//! with `merge_action()`.
//!
//! # Architecture
//!
//! ```text
//! MergeStatement → compile (bind, validate) → SourceUnifier → RowClassifier
//!                → select_action → MutationExecutor → ReturningCollector
//! ```
//!
//! [`MergeEngine`] owns shared MVCC storage and a default session. Extra
//! sessions over the same storage come from [`MergeEngine::create_session`].
//!
//! # Example
//!
//! ```rust
//! use mergesql::{
//!     Assignment, DataType, Expr, Field, MergeEngine, MergeSource, MergeStatement, Schema,
//!     Value,
//! };
//!
//! let mut engine = MergeEngine::new();
//! let schema = Schema::from_fields(vec![
//!     Field::required("id", DataType::Int64),
//!     Field::nullable("v", DataType::String),
//! ]);
//! engine.create_table("target", schema.clone()).unwrap();
//! engine.create_table("source", schema).unwrap();
//! engine
//!     .insert_rows("target", vec![vec![Value::int64(1), Value::string("a")]])
//!     .unwrap();
//! engine
//!     .insert_rows("source", vec![vec![Value::int64(1), Value::string("A")]])
//!     .unwrap();
//!
//! let stmt = MergeStatement::new(
//!     "target",
//!     MergeSource::table("s", "source"),
//!     Expr::qualified_column("t", "id").eq(Expr::qualified_column("s", "id")),
//! )
//! .alias("t")
//! .when_matched_update(None, vec![Assignment::new("v", Expr::qualified_column("s", "v"))]);
//!
//! let outcome = engine.execute_merge(&stmt).unwrap();
//! assert_eq!(outcome.rows_affected, 1);
//! ```

pub use mergesql_common::error::{Error, ErrorKind, Result};
pub use mergesql_common::types::{DataType, Value};
pub use mergesql_executor::{
    CardinalityCheck, JoinStrategy, MergeConfig, MergeOutcome, MergeStats, MutationKind,
    QueryExecutor, ReturningRow, ReturningSet,
};
pub use mergesql_ir::{
    Assignment, BinaryOp, CaseWhen, CteDefinition, Expr, Literal, MergeAction, MergeCategory,
    MergeSource, MergeStatement, PlanField, ReturningItem, ScalarFunction, SourceQuery,
    SourceRelation, UnaryOp, WhenClause,
};
pub use mergesql_storage::{
    Field, FieldMode, IsolationLevel, Record, Schema, SharedStorage, Storage, Table,
};

pub struct MergeEngine {
    storage: SharedStorage,
    executor: QueryExecutor,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::with_storage(Storage::new().shared())
    }

    pub fn with_storage(storage: SharedStorage) -> Self {
        Self {
            executor: QueryExecutor::new(storage.clone()),
            storage,
        }
    }

    pub fn with_config(mut self, config: MergeConfig) -> Self {
        self.executor.set_config(config);
        self
    }

    pub fn config(&self) -> &MergeConfig {
        self.executor.config()
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// A new session over the same storage, with its own transaction state
    /// and this engine's configuration.
    pub fn create_session(&self) -> QueryExecutor {
        QueryExecutor::new(self.storage.clone()).with_config(self.executor.config().clone())
    }

    /// DDL takes effect immediately and is not undone by `rollback()`.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<()> {
        self.storage.write().create_table(name, schema)
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.storage.write().drop_table(name)
    }

    pub fn insert_rows(&mut self, table: &str, rows: Vec<Vec<Value>>) -> Result<usize> {
        self.executor.insert_rows(table, rows)
    }

    pub fn scan_table(&mut self, table: &str) -> Result<Table> {
        self.executor.scan_table(table)
    }

    pub fn begin(&mut self) -> Result<()> {
        self.executor.begin()
    }

    pub fn begin_with_isolation(&mut self, level: IsolationLevel) -> Result<()> {
        self.executor.begin_with_isolation(level)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.executor.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.executor.rollback()
    }

    pub fn savepoint(&mut self, name: &str) -> Result<()> {
        self.executor.savepoint(name)
    }

    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.executor.rollback_to_savepoint(name)
    }

    pub fn in_transaction(&self) -> bool {
        self.executor.in_transaction()
    }

    pub fn execute_merge(&mut self, stmt: &MergeStatement) -> Result<MergeOutcome> {
        self.executor.execute_merge(stmt)
    }

    pub fn explain_merge(&mut self, stmt: &MergeStatement) -> Result<String> {
        self.executor.explain_merge(stmt)
    }

    pub fn vacuum(&self) -> usize {
        self.storage.write().vacuum()
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut QueryExecutor {
        &mut self.executor
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}
