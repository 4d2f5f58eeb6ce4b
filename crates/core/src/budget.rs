use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::category::normalize_category;
use crate::money::Money;
use crate::period::MonthPeriod;
use crate::store::{LedgerStore, StoreError};
use crate::transaction::Transaction;

/// Number of segments in a rendered budget bar.
pub const BAR_SEGMENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BudgetId(pub i64);

impl fmt::Display for BudgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BudgetPeriod {
    #[default]
    Monthly,
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetPeriod::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(BudgetPeriod::Monthly),
            other => Err(format!("Unsupported budget period: '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Budget limit must be positive, got {0}")]
    NonPositiveLimit(Money),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub category: String,
    pub limit: Money,
    pub period: BudgetPeriod,
}

/// A validated budget request. At most one budget exists per category, so
/// storing this replaces any earlier limit for the same category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBudget {
    category: String,
    limit: Money,
    period: BudgetPeriod,
}

impl NewBudget {
    pub fn monthly(category: &str, limit: Money) -> Result<Self, BudgetError> {
        if !limit.is_positive() {
            return Err(BudgetError::NonPositiveLimit(limit));
        }
        Ok(NewBudget {
            category: normalize_category(category),
            limit,
            period: BudgetPeriod::Monthly,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn limit(&self) -> Money {
        self.limit
    }

    pub fn period(&self) -> BudgetPeriod {
        self.period
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// The limit is zero, so no ratio exists.
    Indeterminate,
    Normal { ratio: Decimal },
    /// More than 90% and at most 100% of the limit spent.
    NearLimit { ratio: Decimal },
    OverBudget { ratio: Decimal },
}

impl BudgetStatus {
    pub fn evaluate(spent: Money, limit: Money) -> Self {
        if !limit.is_positive() {
            return BudgetStatus::Indeterminate;
        }
        let Some(ratio) = spent.ratio(limit) else {
            return BudgetStatus::Indeterminate;
        };
        if ratio > Decimal::ONE {
            BudgetStatus::OverBudget { ratio }
        } else if ratio > Decimal::new(9, 1) {
            BudgetStatus::NearLimit { ratio }
        } else {
            BudgetStatus::Normal { ratio }
        }
    }

    pub fn ratio(self) -> Option<Decimal> {
        match self {
            BudgetStatus::Indeterminate => None,
            BudgetStatus::Normal { ratio }
            | BudgetStatus::NearLimit { ratio }
            | BudgetStatus::OverBudget { ratio } => Some(ratio),
        }
    }

    /// Whole percent of the limit spent, rounded.
    pub fn percent(self) -> Option<i64> {
        self.ratio()
            .and_then(|r| (r * Decimal::ONE_HUNDRED).round().to_i64())
    }

    /// `floor(ratio * 10)` clamped to the bar width.
    pub fn filled_segments(self) -> usize {
        self.ratio()
            .and_then(|r| (r * Decimal::from(BAR_SEGMENTS)).floor().to_usize())
            .unwrap_or(0)
            .min(BAR_SEGMENTS)
    }

    fn bar(self) -> String {
        let filled = self.filled_segments();
        format!("[{}{}]", "█".repeat(filled), "-".repeat(BAR_SEGMENTS - filled))
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = self.percent().unwrap_or(0);
        match self {
            BudgetStatus::Indeterminate => write!(f, "[???]"),
            BudgetStatus::OverBudget { .. } => write!(f, "[!! OVER BUDGET !!]"),
            BudgetStatus::NearLimit { .. } => write!(f, "{} {percent}% NEAR LIMIT", self.bar()),
            BudgetStatus::Normal { .. } => write!(f, "{} {percent}%", self.bar()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetAlert {
    OverBudget {
        category: String,
        spent: Money,
        limit: Money,
    },
    NearLimit {
        category: String,
        spent: Money,
        limit: Money,
        percent: i64,
    },
}

impl fmt::Display for BudgetAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetAlert::OverBudget { category, spent, limit } => write!(
                f,
                "ALERT: budget exceeded for {category} (spent {spent} of {limit})"
            ),
            BudgetAlert::NearLimit { category, spent, limit, percent } => write!(
                f,
                "WARNING: {percent}% of the {category} budget used (spent {spent} of {limit})"
            ),
        }
    }
}

/// One row of the budget overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetLine {
    pub budget: Budget,
    pub spent: Money,
    pub status: BudgetStatus,
}

impl BudgetLine {
    pub fn remaining(&self) -> Money {
        self.budget.limit - self.spent
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Budget operations over an explicit store handle. Every figure is recomputed
/// from the store on each call.
pub struct BudgetEngine<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> BudgetEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn set_budget(&self, category: &str, limit: Money) -> Result<Budget, BudgetError> {
        let budget = NewBudget::monthly(category, limit)?;
        let stored = self.store.upsert_budget(&budget).await?;
        tracing::info!(category = %stored.category, limit = %stored.limit, "budget set");
        Ok(stored)
    }

    pub async fn remove_budget(&self, id: BudgetId) -> Result<(), StoreError> {
        self.store.delete_budget(id).await
    }

    pub async fn spending_total(
        &self,
        category: &str,
        period: MonthPeriod,
    ) -> Result<Money, StoreError> {
        self.store
            .spending_total(&normalize_category(category), period)
            .await
    }

    pub async fn line(&self, budget: Budget, period: MonthPeriod) -> Result<BudgetLine, StoreError> {
        let spent = self.store.spending_total(&budget.category, period).await?;
        let status = BudgetStatus::evaluate(spent, budget.limit);
        Ok(BudgetLine { budget, spent, status })
    }

    pub async fn overview(&self, period: MonthPeriod) -> Result<Vec<BudgetLine>, StoreError> {
        let budgets = self.store.list_budgets().await?;
        let mut lines = Vec::with_capacity(budgets.len());
        for budget in budgets {
            lines.push(self.line(budget, period).await?);
        }
        Ok(lines)
    }

    /// Alert for `category` in `period`, or `None` when spending is at or
    /// below 90% of the limit or no budget exists.
    pub async fn check_alert(
        &self,
        category: &str,
        period: MonthPeriod,
    ) -> Result<Option<BudgetAlert>, StoreError> {
        let category = normalize_category(category);
        let Some(budget) = self.store.budget_for_category(&category).await? else {
            return Ok(None);
        };
        let line = self.line(budget, period).await?;
        let alert = match line.status {
            BudgetStatus::OverBudget { .. } => Some(BudgetAlert::OverBudget {
                category: line.budget.category,
                spent: line.spent,
                limit: line.budget.limit,
            }),
            BudgetStatus::NearLimit { .. } => Some(BudgetAlert::NearLimit {
                percent: line.status.percent().unwrap_or(0),
                category: line.budget.category,
                spent: line.spent,
                limit: line.budget.limit,
            }),
            BudgetStatus::Normal { .. } | BudgetStatus::Indeterminate => None,
        };
        if let Some(alert) = &alert {
            tracing::warn!(%alert, "budget threshold crossed");
        }
        Ok(alert)
    }

    /// Runs the alert check for a freshly added transaction. Income never alerts.
    pub async fn alert_for(&self, tx: &Transaction) -> Result<Option<BudgetAlert>, StoreError> {
        if !tx.is_expense() {
            return Ok(None);
        }
        self.check_alert(&tx.category, MonthPeriod::containing(tx.date))
            .await
    }
}
