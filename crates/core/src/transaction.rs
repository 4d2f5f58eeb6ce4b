use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::category::normalize_category;
use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Description must not be empty")]
    EmptyDescription,
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(Money),
}

/// A transaction that has passed validation but has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category: String,
}

impl NewTransaction {
    /// Trims the description, normalizes the category and checks that the
    /// amount fits the persisted cents column.
    pub fn new(
        date: NaiveDate,
        description: &str,
        amount: Money,
        category: &str,
    ) -> Result<Self, TransactionError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TransactionError::EmptyDescription);
        }
        if amount.checked_cents().is_none() {
            return Err(TransactionError::AmountOutOfRange(amount));
        }
        Ok(NewTransaction {
            date,
            description: description.to_string(),
            amount,
            category: normalize_category(category),
        })
    }

    pub fn is_expense(&self) -> bool {
        self.amount.is_negative()
    }

    /// True when both refer to the same (date, description, amount) tuple.
    pub fn same_entry(&self, other: &Transaction) -> bool {
        self.date == other.date
            && self.description == other.description
            && self.amount == other.amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.amount.is_negative()
    }
}

/// Field-wise changes for an existing transaction. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount: Option<Money>,
    pub category: Option<String>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.category.is_none()
    }

    /// Produces the validated replacement for `existing`.
    pub fn apply(&self, existing: &Transaction) -> Result<NewTransaction, TransactionError> {
        NewTransaction::new(
            self.date.unwrap_or(existing.date),
            self.description.as_deref().unwrap_or(&existing.description),
            self.amount.unwrap_or(existing.amount),
            self.category.as_deref().unwrap_or(&existing.category),
        )
    }
}
