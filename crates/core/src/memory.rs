use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::budget::{Budget, BudgetId, NewBudget};
use crate::money::Money;
use crate::period::MonthPeriod;
use crate::report::CategoryTotal;
use crate::rule::{CategoryRule, NewCategoryRule, RuleId};
use crate::store::{LedgerStore, StoreError};
use crate::transaction::{NewTransaction, Transaction, TransactionId};

#[derive(Default)]
struct Inner {
    next_id: i64,
    transactions: Vec<Transaction>,
    rules: Vec<CategoryRule>,
    budgets: Vec<Budget>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process [`LedgerStore`] backed by plain vectors. Nothing survives the
/// process; useful for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::backend("memory store lock poisoned"))
    }
}

fn newest_first(mut list: Vec<Transaction>) -> Vec<Transaction> {
    list.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    list
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction, StoreError> {
        let mut inner = self.lock()?;
        let id = TransactionId(inner.next_id());
        let stored = Transaction {
            id,
            date: tx.date,
            description: tx.description.clone(),
            amount: tx.amount,
            category: tx.category.clone(),
            created_at: Utc::now(),
        };
        inner.transactions.push(stored.clone());
        Ok(stored)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.lock()?;
        Ok(newest_first(inner.transactions.clone()))
    }

    async fn search_transactions(&self, query: &str) -> Result<Vec<Transaction>, StoreError> {
        // ASCII folding only, matching SQLite's lower().
        let needle = query.to_ascii_lowercase();
        let inner = self.lock()?;
        let hits = inner
            .transactions
            .iter()
            .filter(|t| {
                t.description.to_ascii_lowercase().contains(&needle)
                    || t.category.to_ascii_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(newest_first(hits))
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        tx: &NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let mut inner = self.lock()?;
        let existing = inner
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound { entity: "Transaction", id: id.0 })?;
        existing.date = tx.date;
        existing.description = tx.description.clone();
        existing.amount = tx.amount;
        existing.category = tx.category.clone();
        Ok(existing.clone())
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let before = inner.transactions.len();
        inner.transactions.retain(|t| t.id != id);
        if inner.transactions.len() == before {
            return Err(StoreError::NotFound { entity: "Transaction", id: id.0 });
        }
        Ok(())
    }

    async fn transaction_exists(&self, tx: &NewTransaction) -> Result<bool, StoreError> {
        let inner = self.lock()?;
        Ok(inner.transactions.iter().any(|t| tx.same_entry(t)))
    }

    async fn create_rule(&self, rule: &NewCategoryRule) -> Result<CategoryRule, StoreError> {
        let mut inner = self.lock()?;
        let stored = CategoryRule {
            id: RuleId(inner.next_id()),
            pattern: rule.pattern().to_string(),
            category: rule.category().to_string(),
        };
        inner.rules.push(stored.clone());
        Ok(stored)
    }

    async fn list_rules(&self) -> Result<Vec<CategoryRule>, StoreError> {
        Ok(self.lock()?.rules.clone())
    }

    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let before = inner.rules.len();
        inner.rules.retain(|r| r.id != id);
        if inner.rules.len() == before {
            return Err(StoreError::NotFound { entity: "Rule", id: id.0 });
        }
        Ok(())
    }

    async fn upsert_budget(&self, budget: &NewBudget) -> Result<Budget, StoreError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner
            .budgets
            .iter_mut()
            .find(|b| b.category == budget.category())
        {
            existing.limit = budget.limit();
            existing.period = budget.period();
            return Ok(existing.clone());
        }
        let stored = Budget {
            id: BudgetId(inner.next_id()),
            category: budget.category().to_string(),
            limit: budget.limit(),
            period: budget.period(),
        };
        inner.budgets.push(stored.clone());
        Ok(stored)
    }

    async fn list_budgets(&self) -> Result<Vec<Budget>, StoreError> {
        let mut budgets = self.lock()?.budgets.clone();
        budgets.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(budgets)
    }

    async fn budget_for_category(&self, category: &str) -> Result<Option<Budget>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.budgets.iter().find(|b| b.category == category).cloned())
    }

    async fn delete_budget(&self, id: BudgetId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let before = inner.budgets.len();
        inner.budgets.retain(|b| b.id != id);
        if inner.budgets.len() == before {
            return Err(StoreError::NotFound { entity: "Budget", id: id.0 });
        }
        Ok(())
    }

    async fn spending_total(&self, category: &str, period: MonthPeriod) -> Result<Money, StoreError> {
        let inner = self.lock()?;
        let spent: Money = inner
            .transactions
            .iter()
            .filter(|t| t.category == category && period.contains(t.date) && t.is_expense())
            .map(|t| t.amount)
            .sum();
        Ok(spent.abs())
    }

    async fn monthly_aggregate(&self, period: MonthPeriod) -> Result<Vec<CategoryTotal>, StoreError> {
        let inner = self.lock()?;
        let mut sums: BTreeMap<&str, Money> = BTreeMap::new();
        for t in inner.transactions.iter().filter(|t| period.contains(t.date)) {
            *sums.entry(t.category.as_str()).or_default() += t.amount;
        }
        Ok(sums
            .into_iter()
            .map(|(category, net)| CategoryTotal {
                category: category.to_string(),
                net,
            })
            .collect())
    }
}
