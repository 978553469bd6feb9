use serde::{Deserialize, Serialize};

use super::SourceRelation;

/// A named relation declared in the statement's `WITH` list. Every reference
/// to it within one execution reads the same materialized rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CteDefinition {
    pub name: String,
    pub columns: Option<Vec<String>>,
    pub query: Box<SourceRelation>,
}

impl CteDefinition {
    pub fn new(name: impl Into<String>, query: SourceRelation) -> Self {
        Self {
            name: name.into(),
            columns: None,
            query: Box::new(query),
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }
}
