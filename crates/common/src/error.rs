pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification callers use to tell integrity failures apart from
/// retryable concurrency failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SchemaMismatch,
    InvalidClauseForCategory,
    CardinalityViolation,
    DoubleMatchViolation,
    ConcurrentUpdateConflict,
    TypeMismatch,
    EvaluationError,
    Other,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Table does not exist: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Ambiguous column '{column}' in tables: {tables}")]
    AmbiguousColumn { column: String, tables: String },

    #[error("Row not found: {0}")]
    RowNotFound(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("WHEN {category} clause cannot use {action} action")]
    InvalidClauseForCategory { category: String, action: String },

    #[error(
        "MERGE matched {matches} source rows (from {origins}) for the same target row {target_key}. Each target row may be matched by at most one source row. Check your ON condition for duplicate matches."
    )]
    MergeCardinalityViolation {
        target_key: String,
        matches: usize,
        origins: String,
    },

    #[error("MERGE cannot affect target row {target_key} a second time")]
    DoubleMatchViolation { target_key: String },

    #[error("could not serialize access due to concurrent update of {table} row {row_key}")]
    ConcurrentUpdateConflict { table: String, row_key: String },

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("NOT NULL constraint violation for column '{column}'")]
    NotNullViolation { column: String },

    #[error("UNIQUE constraint violation: {0}")]
    UniqueConstraintViolation(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow in {operation}: {left} and {right}")]
    ArithmeticOverflow {
        operation: String,
        left: String,
        right: String,
    },

    #[error("Cannot {operation}: no active transaction")]
    NoActiveTransaction { operation: String },

    #[error("Cannot {operation}: an explicit transaction is already active")]
    ActiveSqlTransaction { operation: String },

    #[error("Cannot {operation}: the current transaction is aborted and must be rolled back")]
    TransactionAborted { operation: String },

    #[error("Savepoint not found: {name}")]
    SavepointNotFound { name: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl Error {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Error::InvalidQuery(msg.into())
    }

    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound(name.into())
    }

    pub fn column_not_found(name: impl Into<String>) -> Self {
        Error::ColumnNotFound(name.into())
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Error::EvaluationError(msg.into())
    }

    pub fn concurrent_update(table: impl Into<String>, row_key: impl Into<String>) -> Self {
        Error::ConcurrentUpdateConflict {
            table: table.into(),
            row_key: row_key.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::InternalError(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Error::InvalidClauseForCategory { .. } => ErrorKind::InvalidClauseForCategory,
            Error::MergeCardinalityViolation { .. } => ErrorKind::CardinalityViolation,
            Error::DoubleMatchViolation { .. } => ErrorKind::DoubleMatchViolation,
            Error::ConcurrentUpdateConflict { .. } => ErrorKind::ConcurrentUpdateConflict,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::EvaluationError(_)
            | Error::ConstraintViolation(_)
            | Error::NotNullViolation { .. }
            | Error::UniqueConstraintViolation(_)
            | Error::DivisionByZero
            | Error::ArithmeticOverflow { .. } => ErrorKind::EvaluationError,
            Error::InvalidQuery(_)
            | Error::TableNotFound(_)
            | Error::ColumnNotFound(_)
            | Error::AmbiguousColumn { .. }
            | Error::RowNotFound(_)
            | Error::NoActiveTransaction { .. }
            | Error::ActiveSqlTransaction { .. }
            | Error::TransactionAborted { .. }
            | Error::SavepointNotFound { .. }
            | Error::InternalError(_) => ErrorKind::Other,
        }
    }

    /// Only concurrency conflicts are safe to retry; everything else will
    /// fail the same way on the same data.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ConcurrentUpdateConflict
    }

    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CardinalityViolation | ErrorKind::DoubleMatchViolation
        )
    }
}
