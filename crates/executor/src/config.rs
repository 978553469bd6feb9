use mergesql_common::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How the classifier pairs source rows with target rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JoinStrategy {
    /// Hash join when the ON condition has equi-key conjuncts, nested loop
    /// otherwise.
    #[default]
    Auto,
    Hash,
    NestedLoop,
}

impl JoinStrategy {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(JoinStrategy::Auto),
            "hash" => Ok(JoinStrategy::Hash),
            "nested_loop" | "nested-loop" => Ok(JoinStrategy::NestedLoop),
            _ => Err(Error::InvalidQuery(format!(
                "Invalid join strategy: '{}'. Valid values: auto, hash, nested_loop",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinStrategy::Auto => "auto",
            JoinStrategy::Hash => "hash",
            JoinStrategy::NestedLoop => "nested_loop",
        }
    }
}

/// When a target row matched by several source rows is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CardinalityCheck {
    /// Any second match is a cardinality violation.
    #[default]
    Strict,
    /// Each source input may match a target row once. Matches from different
    /// inputs are allowed through and the affected-row guard decides.
    PerSourceInput,
}

impl CardinalityCheck {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(CardinalityCheck::Strict),
            "per_source_input" | "per-source-input" => Ok(CardinalityCheck::PerSourceInput),
            _ => Err(Error::InvalidQuery(format!(
                "Invalid cardinality check: '{}'. Valid values: strict, per_source_input",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardinalityCheck::Strict => "strict",
            CardinalityCheck::PerSourceInput => "per_source_input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub join_strategy: JoinStrategy,
    pub cardinality: CardinalityCheck,
    /// Upper bound on buffered RETURNING rows. `None` is unbounded.
    pub max_returning_rows: Option<usize>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            join_strategy: JoinStrategy::Auto,
            cardinality: CardinalityCheck::Strict,
            max_returning_rows: None,
        }
    }
}

impl MergeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_join_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.join_strategy = strategy;
        self
    }

    pub fn with_cardinality(mut self, check: CardinalityCheck) -> Self {
        self.cardinality = check;
        self
    }

    pub fn with_max_returning_rows(mut self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidQuery(
                "max_returning_rows must be at least 1".to_string(),
            ));
        }
        self.max_returning_rows = Some(limit);
        Ok(self)
    }
}
