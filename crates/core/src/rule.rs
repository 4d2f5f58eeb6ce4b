use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::category::normalize_category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Invalid rule pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Rule pattern must not be empty")]
    EmptyPattern,
}

/// A persisted pattern -> category rule. Rules are evaluated in the order the
/// store lists them, which is creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: RuleId,
    pub pattern: String,
    pub category: String,
}

impl CategoryRule {
    pub fn compile(&self) -> Result<Regex, RuleError> {
        compile_pattern(&self.pattern)
    }
}

/// A rule whose pattern is known to compile, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategoryRule {
    pattern: String,
    category: String,
}

impl NewCategoryRule {
    pub fn new(pattern: &str, category: &str) -> Result<Self, RuleError> {
        compile_pattern(pattern)?;
        Ok(NewCategoryRule {
            pattern: pattern.to_string(),
            category: normalize_category(category),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

/// Compiles a rule pattern the way the matcher uses it: case-insensitive.
pub fn compile_pattern(pattern: &str) -> Result<Regex, RuleError> {
    if pattern.trim().is_empty() {
        return Err(RuleError::EmptyPattern);
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}
