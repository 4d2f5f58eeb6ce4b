use regex::Regex;
use serde::Deserialize;
use tally_core::{CategoryRule, LedgerStore, NewCategoryRule, RuleError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("Stored rule {id} is invalid: {source}")]
    StoredRule { id: i64, source: RuleError },
    #[error("Failed to parse rules file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Rule #{index} in rules file: {source}")]
    FileEntry { index: usize, source: RuleError },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Internal pairing of a rule with its compiled, case-insensitive regex.
struct CompiledRule {
    rule: CategoryRule,
    regex: Regex,
}

/// Ordered first-match-wins rule set. Evaluation order is exactly the order
/// the rules were supplied in; there is no priority field.
pub struct CategoryRuleEngine {
    rules: Vec<CompiledRule>,
}

impl CategoryRuleEngine {
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, RulesError> {
        let compiled = rules
            .into_iter()
            .map(|rule| {
                let regex = rule.compile().map_err(|source| RulesError::StoredRule {
                    id: rule.id.0,
                    source,
                })?;
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<_>, RulesError>>()?;
        Ok(Self { rules: compiled })
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Builds the engine from the store's rules, in store (creation) order.
    pub async fn load<S: LedgerStore + ?Sized>(store: &S) -> Result<Self, RulesError> {
        let rules = store.list_rules().await?;
        tracing::debug!(count = rules.len(), "loaded categorization rules");
        Self::new(rules)
    }

    pub fn find_matching_rule(&self, description: &str) -> Option<&CategoryRule> {
        self.rules
            .iter()
            .find(|cr| cr.regex.is_match(description))
            .map(|cr| &cr.rule)
    }

    /// Category of the first rule matching `description`.
    pub fn categorize(&self, description: &str) -> Option<&str> {
        self.find_matching_rule(description)
            .map(|rule| rule.category.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ── Rule creation ─────────────────────────────────────────────────────────────

/// Validates and stores one rule. Invalid patterns never reach the store.
pub async fn add_rule<S: LedgerStore + ?Sized>(
    store: &S,
    pattern: &str,
    category: &str,
) -> Result<CategoryRule, RulesError> {
    let rule = NewCategoryRule::new(pattern, category)?;
    let stored = store.create_rule(&rule).await?;
    tracing::info!(id = stored.id.0, pattern = %stored.pattern, category = %stored.category, "rule added");
    Ok(stored)
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    pattern: String,
    category: String,
}

/// Parses a TOML rules file of `[[rule]]` tables with `pattern` and
/// `category` keys. Every entry is validated before any is returned.
pub fn parse_rule_file(toml_content: &str) -> Result<Vec<NewCategoryRule>, RulesError> {
    let file: RuleFile = toml::from_str(toml_content)?;
    file.rule
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            NewCategoryRule::new(&entry.pattern, &entry.category)
                .map_err(|source| RulesError::FileEntry { index: idx + 1, source })
        })
        .collect()
}

/// Stores every rule from a rules file, in file order, after validating all
/// of them.
pub async fn import_rule_file<S: LedgerStore + ?Sized>(
    store: &S,
    toml_content: &str,
) -> Result<Vec<CategoryRule>, RulesError> {
    let rules = parse_rule_file(toml_content)?;
    let mut stored = Vec::with_capacity(rules.len());
    for rule in &rules {
        stored.push(store.create_rule(rule).await?);
    }
    tracing::info!(count = stored.len(), "rules imported");
    Ok(stored)
}
