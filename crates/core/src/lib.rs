pub mod budget;
pub mod category;
pub mod memory;
pub mod money;
pub mod period;
pub mod report;
pub mod rule;
pub mod store;
pub mod transaction;

pub use budget::{
    Budget, BudgetAlert, BudgetEngine, BudgetError, BudgetId, BudgetLine, BudgetPeriod,
    BudgetStatus, NewBudget,
};
pub use category::{normalize_category, DEFAULT_CATEGORY};
pub use memory::MemoryStore;
pub use money::Money;
pub use period::{DateRange, MonthPeriod, PeriodError};
pub use report::{CategoryTotal, MonthlyReport, ReportAggregator};
pub use rule::{compile_pattern, CategoryRule, NewCategoryRule, RuleError, RuleId};
pub use store::{LedgerStore, StoreError};
pub use transaction::{NewTransaction, Transaction, TransactionError, TransactionId, TransactionUpdate};
