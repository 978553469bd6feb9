use serde::{Deserialize, Serialize};

use super::Expr;

/// One `WHEN ... THEN ...` arm of a `CASE` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseWhen {
    pub condition: Expr,
    pub result: Expr,
}
