//! MERGE execution for mergesql: source unification, three-way row
//! classification, ordered `WHEN` clause dispatch, guarded mutations and
//! `RETURNING`, plus the session layer that runs statements inside
//! transactions.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod ir_evaluator;
pub mod merge;
pub mod query_executor;

pub use config::{CardinalityCheck, JoinStrategy, MergeConfig};
pub use ir_evaluator::{IrEvaluator, infer_type};
pub use merge::{
    MergeExecutor, MergeOutcome, MergeStats, MutationKind, ReturningRow, ReturningSet,
};
pub use query_executor::QueryExecutor;
