use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::period::MonthPeriod;
use crate::store::{LedgerStore, StoreError};

/// Width in characters of the longest bar in a report breakdown.
pub const REPORT_BAR_WIDTH: usize = 20;

/// Signed sum of one category's transactions within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub net: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    pub period: MonthPeriod,
    /// Ascending by net amount, so the largest expense comes first.
    pub breakdown: Vec<CategoryTotal>,
    pub total_income: Money,
    /// Sum of the negative category nets; never positive.
    pub total_expense: Money,
}

impl MonthlyReport {
    pub fn from_totals(period: MonthPeriod, mut breakdown: Vec<CategoryTotal>) -> Self {
        breakdown.sort_by(|a, b| a.net.cmp(&b.net).then_with(|| a.category.cmp(&b.category)));

        let total_income = breakdown
            .iter()
            .map(|c| c.net)
            .filter(|n| n.is_positive())
            .sum();
        let total_expense = breakdown
            .iter()
            .map(|c| c.net)
            .filter(|n| n.is_negative())
            .sum();

        MonthlyReport {
            period,
            breakdown,
            total_income,
            total_expense,
        }
    }

    pub fn net_savings(&self) -> Money {
        self.total_income + self.total_expense
    }

    pub fn is_empty(&self) -> bool {
        self.breakdown.is_empty()
    }

    fn largest_abs(&self) -> Money {
        self.breakdown
            .iter()
            .map(|c| c.net.abs())
            .max()
            .unwrap_or_default()
    }

    /// Bar length for `entry`, scaled so the largest absolute net fills
    /// [`REPORT_BAR_WIDTH`].
    pub fn bar_len(&self, entry: &CategoryTotal) -> usize {
        let Some(ratio) = entry.net.abs().ratio(self.largest_abs()) else {
            return 0;
        };
        (ratio * Decimal::from(REPORT_BAR_WIDTH))
            .floor()
            .to_usize()
            .unwrap_or(0)
            .min(REPORT_BAR_WIDTH)
    }

    pub fn bar(&self, entry: &CategoryTotal) -> String {
        "█".repeat(self.bar_len(entry))
    }
}

/// Month-scoped category aggregation over an explicit store handle.
pub struct ReportAggregator<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: LedgerStore + ?Sized> ReportAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// An empty breakdown means no transactions fell in the month; failures
    /// to query come back as `Err`.
    pub async fn monthly_report(&self, period: MonthPeriod) -> Result<MonthlyReport, StoreError> {
        let totals = self.store.monthly_aggregate(period).await?;
        tracing::debug!(%period, categories = totals.len(), "monthly aggregate loaded");
        Ok(MonthlyReport::from_totals(period, totals))
    }
}
