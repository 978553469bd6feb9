//! Expression trees and the compiled form of `MERGE` statements.

pub mod expr;
pub mod plan;
pub mod schema;

pub use expr::{BinaryOp, CaseWhen, Expr, Literal, ScalarFunction, UnaryOp};
pub use plan::{
    CteDefinition, MergeAction, MergeCategory, MergeSource, MergeStatement, ReturningItem,
    SourceQuery, SourceRelation, WhenClause,
};
pub use schema::{Assignment, PlanField, PlanSchema};
