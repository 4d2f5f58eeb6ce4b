use async_trait::async_trait;
use thiserror::Error;

use crate::budget::{Budget, BudgetId, NewBudget};
use crate::money::Money;
use crate::period::MonthPeriod;
use crate::report::CategoryTotal;
use crate::rule::{CategoryRule, NewCategoryRule, RuleId};
use crate::transaction::{NewTransaction, Transaction, TransactionId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Stored {entity} is corrupt: {reason}")]
    Corrupt { entity: &'static str, reason: String },
    #[error("Storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Backend(err.into())
    }
}

/// Persistence boundary for the ledger.
///
/// Implementations must give read-after-write consistency; nothing above this
/// trait caches results. Listing methods return transactions newest date
/// first and rules in creation order.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction, StoreError>;
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;
    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError>;
    /// Substring match on description or category, folding ASCII case only.
    async fn search_transactions(&self, query: &str) -> Result<Vec<Transaction>, StoreError>;
    async fn update_transaction(
        &self,
        id: TransactionId,
        tx: &NewTransaction,
    ) -> Result<Transaction, StoreError>;
    async fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError>;
    /// Exact (date, description, amount) match against persisted rows.
    async fn transaction_exists(&self, tx: &NewTransaction) -> Result<bool, StoreError>;

    async fn create_rule(&self, rule: &NewCategoryRule) -> Result<CategoryRule, StoreError>;
    async fn list_rules(&self) -> Result<Vec<CategoryRule>, StoreError>;
    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError>;

    /// Creates the budget, or replaces the limit of the existing budget for
    /// the same category.
    async fn upsert_budget(&self, budget: &NewBudget) -> Result<Budget, StoreError>;
    async fn list_budgets(&self) -> Result<Vec<Budget>, StoreError>;
    async fn budget_for_category(&self, category: &str) -> Result<Option<Budget>, StoreError>;
    async fn delete_budget(&self, id: BudgetId) -> Result<(), StoreError>;

    /// Absolute sum of expenses (amount < 0) in `category` dated within `period`.
    async fn spending_total(&self, category: &str, period: MonthPeriod) -> Result<Money, StoreError>;
    /// Signed per-category sums for `period`.
    async fn monthly_aggregate(&self, period: MonthPeriod) -> Result<Vec<CategoryTotal>, StoreError>;
}
