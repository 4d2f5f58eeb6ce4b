use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use tally_core::{
    Budget, BudgetId, BudgetPeriod, CategoryRule, CategoryTotal, LedgerStore, Money, MonthPeriod,
    NewBudget, NewCategoryRule, NewTransaction, RuleId, StoreError, Transaction, TransactionId,
};

use crate::db::{create_db, DbPool};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

type TransactionRow = (i64, String, String, i64, String, String);
type BudgetRow = (i64, String, i64, String);

const TRANSACTION_COLUMNS: &str = "id, date, description, amount_cents, category, created_at";

/// [`LedgerStore`] over a single-connection SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = create_db(path).await.map_err(StoreError::backend)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ── Row mapping ──────────────────────────────────────────────────────────────

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn cents(amount: Money) -> Result<i64, StoreError> {
    amount.checked_cents().ok_or_else(|| StoreError::Corrupt {
        entity: "Transaction",
        reason: format!("amount {amount} does not fit in cents"),
    })
}

fn row_to_transaction(r: TransactionRow) -> Result<Transaction, StoreError> {
    let date = NaiveDate::parse_from_str(&r.1, DATE_FORMAT).map_err(|e| StoreError::Corrupt {
        entity: "Transaction",
        reason: format!("id {}: bad date '{}': {e}", r.0, r.1),
    })?;
    let created_at = NaiveDateTime::parse_from_str(&r.5, TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| StoreError::Corrupt {
            entity: "Transaction",
            reason: format!("id {}: bad timestamp '{}': {e}", r.0, r.5),
        })?;
    Ok(Transaction {
        id: TransactionId(r.0),
        date,
        description: r.2,
        amount: Money::from_cents(r.3),
        category: r.4,
        created_at,
    })
}

fn row_to_budget(r: BudgetRow) -> Result<Budget, StoreError> {
    let period = r.3.parse::<BudgetPeriod>().map_err(|reason| StoreError::Corrupt {
        entity: "Budget",
        reason,
    })?;
    Ok(Budget {
        id: BudgetId(r.0),
        category: r.1,
        limit: Money::from_cents(r.2),
        period,
    })
}

/// Escapes LIKE wildcards so the query matches as a literal substring.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl LedgerStore for SqliteStore {
    // ── Transactions ─────────────────────────────────────────────────────────

    async fn create_transaction(&self, tx: &NewTransaction) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "INSERT INTO transactions (date, description, amount_cents, category) VALUES (?, ?, ?, ?) RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(format_date(tx.date))
        .bind(&tx.description)
        .bind(cents(tx.amount)?)
        .bind(&tx.category)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row_to_transaction(row)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.map(row_to_transaction).transpose()
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn search_transactions(&self, query: &str) -> Result<Vec<Transaction>, StoreError> {
        let pattern = like_pattern(&query.to_ascii_lowercase());
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE lower(description) LIKE ?1 ESCAPE '\\' OR lower(category) LIKE ?1 ESCAPE '\\' \
             ORDER BY date DESC, id DESC"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        tx: &NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE transactions SET date = ?, description = ?, amount_cents = ?, category = ? WHERE id = ? RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(format_date(tx.date))
        .bind(&tx.description)
        .bind(cents(tx.amount)?)
        .bind(&tx.category)
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        match row {
            Some(row) => row_to_transaction(row),
            None => Err(StoreError::NotFound { entity: "Transaction", id: id.0 }),
        }
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "Transaction", id: id.0 });
        }
        Ok(())
    }

    async fn transaction_exists(&self, tx: &NewTransaction) -> Result<bool, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM transactions WHERE date = ? AND description = ? AND amount_cents = ?",
        )
        .bind(format_date(tx.date))
        .bind(&tx.description)
        .bind(cents(tx.amount)?)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(count > 0)
    }

    // ── Rules ────────────────────────────────────────────────────────────────

    async fn create_rule(&self, rule: &NewCategoryRule) -> Result<CategoryRule, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO category_rules (pattern, category) VALUES (?, ?) RETURNING id",
        )
        .bind(rule.pattern())
        .bind(rule.category())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(CategoryRule {
            id: RuleId(id),
            pattern: rule.pattern().to_string(),
            category: rule.category().to_string(),
        })
    }

    async fn list_rules(&self) -> Result<Vec<CategoryRule>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, pattern, category FROM category_rules ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(rows
            .into_iter()
            .map(|r| CategoryRule {
                id: RuleId(r.0),
                pattern: r.1,
                category: r.2,
            })
            .collect())
    }

    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM category_rules WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "Rule", id: id.0 });
        }
        Ok(())
    }

    // ── Budgets ──────────────────────────────────────────────────────────────

    async fn upsert_budget(&self, budget: &NewBudget) -> Result<Budget, StoreError> {
        let row = sqlx::query_as::<_, BudgetRow>(
            "INSERT INTO budgets (category, amount_cents, period) VALUES (?, ?, ?) \
             ON CONFLICT(category) DO UPDATE SET amount_cents = excluded.amount_cents, period = excluded.period \
             RETURNING id, category, amount_cents, period",
        )
        .bind(budget.category())
        .bind(cents(budget.limit())?)
        .bind(budget.period().to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row_to_budget(row)
    }

    async fn list_budgets(&self) -> Result<Vec<Budget>, StoreError> {
        let rows = sqlx::query_as::<_, BudgetRow>(
            "SELECT id, category, amount_cents, period FROM budgets ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(row_to_budget).collect()
    }

    async fn budget_for_category(&self, category: &str) -> Result<Option<Budget>, StoreError> {
        let row = sqlx::query_as::<_, BudgetRow>(
            "SELECT id, category, amount_cents, period FROM budgets WHERE category = ?",
        )
        .bind(category)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.map(row_to_budget).transpose()
    }

    async fn delete_budget(&self, id: BudgetId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM budgets WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "Budget", id: id.0 });
        }
        Ok(())
    }

    // ── Aggregates ───────────────────────────────────────────────────────────

    async fn spending_total(&self, category: &str, period: MonthPeriod) -> Result<Money, StoreError> {
        let range = period.range();
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions \
             WHERE category = ? AND amount_cents < 0 AND date >= ? AND date <= ?",
        )
        .bind(category)
        .bind(format_date(range.start))
        .bind(format_date(range.end))
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(Money::from_cents(total).abs())
    }

    async fn monthly_aggregate(&self, period: MonthPeriod) -> Result<Vec<CategoryTotal>, StoreError> {
        let range = period.range();
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT category, SUM(amount_cents) AS net FROM transactions \
             WHERE date >= ? AND date <= ? \
             GROUP BY category ORDER BY net ASC, category ASC",
        )
        .bind(format_date(range.start))
        .bind(format_date(range.end))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(rows
            .into_iter()
            .map(|(category, net)| CategoryTotal {
                category,
                net: Money::from_cents(net),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn make_store() -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_tx(day: NaiveDate, description: &str, cents: i64, category: &str) -> NewTransaction {
        NewTransaction::new(day, description, Money::from_cents(cents), category).unwrap()
    }

    fn may() -> MonthPeriod {
        MonthPeriod::new(2024, 5).unwrap()
    }

    // ── transactions ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn create_and_get_round_trips_fields() {
        let (_dir, store) = make_store().await;
        let created = store
            .create_transaction(&make_tx(date(2024, 5, 1), "Gym", -3000, "health"))
            .await
            .unwrap();
        let fetched = store.get_transaction(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.date, date(2024, 5, 1));
        assert_eq!(fetched.description, "Gym");
        assert_eq!(fetched.amount, Money::from_cents(-3000));
        assert_eq!(fetched.category, "Health");
        assert!(store.get_transaction(TransactionId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_with_id_tiebreak() {
        let (_dir, store) = make_store().await;
        let a = store.create_transaction(&make_tx(date(2024, 5, 1), "a", -100, "x")).await.unwrap();
        let b = store.create_transaction(&make_tx(date(2024, 5, 3), "b", -100, "x")).await.unwrap();
        let c = store.create_transaction(&make_tx(date(2024, 5, 1), "c", -100, "x")).await.unwrap();

        let ids: Vec<_> = store.list_transactions().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[tokio::test]
    async fn search_matches_description_or_category_literally() {
        let (_dir, store) = make_store().await;
        store.create_transaction(&make_tx(date(2024, 5, 1), "Whole Foods", -5000, "Groceries")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 5, 2), "Shell", -4000, "Fuel")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 5, 3), "100% juice", -300, "Groceries")).await.unwrap();

        assert_eq!(store.search_transactions("FOODS").await.unwrap().len(), 1);
        assert_eq!(store.search_transactions("grocer").await.unwrap().len(), 2);
        let pct = store.search_transactions("0%").await.unwrap();
        assert_eq!(pct.len(), 1);
        assert_eq!(pct[0].description, "100% juice");
        assert!(store.search_transactions("_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_folds_ascii_case_only() {
        let (_dir, store) = make_store().await;
        store.create_transaction(&make_tx(date(2024, 5, 1), "Épicerie Fine", -500, "Groceries")).await.unwrap();

        assert_eq!(store.search_transactions("FINE").await.unwrap().len(), 1);
        assert_eq!(store.search_transactions("Épicerie").await.unwrap().len(), 1);
        assert!(store.search_transactions("épicerie").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_ids() {
        let (_dir, store) = make_store().await;
        let created = store.create_transaction(&make_tx(date(2024, 5, 1), "Cab", -1500, "Travel")).await.unwrap();

        let updated = store
            .update_transaction(created.id, &make_tx(date(2024, 5, 2), "Taxi", -1700, "transport"))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.description, "Taxi");
        assert_eq!(updated.category, "Transport");

        let missing = store
            .update_transaction(TransactionId(42), &make_tx(date(2024, 5, 2), "x", -1, "y"))
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { id: 42, .. })));

        store.delete_transaction(created.id).await.unwrap();
        assert!(matches!(
            store.delete_transaction(created.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn exists_is_exact_tuple_match() {
        let (_dir, store) = make_store().await;
        let tx = make_tx(date(2024, 5, 1), "Coffee", -350, "Cafe");
        assert!(!store.transaction_exists(&tx).await.unwrap());
        store.create_transaction(&tx).await.unwrap();
        assert!(store.transaction_exists(&tx).await.unwrap());

        assert!(!store.transaction_exists(&make_tx(date(2024, 5, 1), "coffee", -350, "Cafe")).await.unwrap());
        assert!(!store.transaction_exists(&make_tx(date(2024, 5, 1), "Coffee", -351, "Cafe")).await.unwrap());
        // Category is not part of the identity.
        assert!(store.transaction_exists(&make_tx(date(2024, 5, 1), "Coffee", -350, "Other")).await.unwrap());
    }

    // ── rules ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn rules_list_in_creation_order() {
        let (_dir, store) = make_store().await;
        let first = store.create_rule(&NewCategoryRule::new("zeta", "Z").unwrap()).await.unwrap();
        let second = store.create_rule(&NewCategoryRule::new("alpha", "A").unwrap()).await.unwrap();

        let rules = store.list_rules().await.unwrap();
        assert_eq!(rules, vec![first.clone(), second]);

        store.delete_rule(first.id).await.unwrap();
        assert_eq!(store.list_rules().await.unwrap().len(), 1);
        assert!(store.delete_rule(first.id).await.is_err());
    }

    // ── budgets ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn upsert_budget_overwrites_by_category() {
        let (_dir, store) = make_store().await;
        let first = store
            .upsert_budget(&NewBudget::monthly("food", Money::from_cents(20000)).unwrap())
            .await
            .unwrap();
        let second = store
            .upsert_budget(&NewBudget::monthly("FOOD", Money::from_cents(30000)).unwrap())
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.limit, Money::from_cents(30000));
        assert_eq!(store.list_budgets().await.unwrap().len(), 1);

        let found = store.budget_for_category("Food").await.unwrap().unwrap();
        assert_eq!(found.period, BudgetPeriod::Monthly);

        store.delete_budget(found.id).await.unwrap();
        assert!(store.budget_for_category("Food").await.unwrap().is_none());
        assert!(matches!(
            store.delete_budget(found.id).await,
            Err(StoreError::NotFound { entity: "Budget", .. })
        ));
    }

    // ── aggregates ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn spending_total_excludes_income_and_other_months() {
        let (_dir, store) = make_store().await;
        store.create_transaction(&make_tx(date(2024, 5, 2), "a", -1000, "Food")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 5, 31), "b", -2000, "Food")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 5, 10), "refund", 500, "Food")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 6, 1), "c", -9900, "Food")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 5, 3), "d", -700, "Fuel")).await.unwrap();

        assert_eq!(store.spending_total("Food", may()).await.unwrap(), Money::from_cents(3000));
        assert_eq!(store.spending_total("Rent", may()).await.unwrap(), Money::zero());
    }

    #[tokio::test]
    async fn monthly_aggregate_nets_per_category() {
        let (_dir, store) = make_store().await;
        store.create_transaction(&make_tx(date(2024, 5, 1), "Salary", 100000, "Income")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 5, 5), "Rent", -20000, "Housing")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 5, 6), "Deposit back", 5000, "Housing")).await.unwrap();
        store.create_transaction(&make_tx(date(2024, 4, 30), "Old", -100, "Housing")).await.unwrap();

        let totals = store.monthly_aggregate(may()).await.unwrap();
        assert_eq!(
            totals,
            vec![
                CategoryTotal { category: "Housing".into(), net: Money::from_cents(-15000) },
                CategoryTotal { category: "Income".into(), net: Money::from_cents(100000) },
            ]
        );
        assert!(store
            .monthly_aggregate(MonthPeriod::new(2023, 1).unwrap())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.db");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.create_transaction(&make_tx(date(2024, 5, 1), "Gym", -3000, "Health")).await.unwrap();
            store.close().await;
        }
        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.list_transactions().await.unwrap().len(), 1);
    }
}
