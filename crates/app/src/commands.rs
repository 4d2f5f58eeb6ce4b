use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use std::io::Write;
use std::path::Path;
use tally_core::{
    BudgetEngine, BudgetId, LedgerStore, Money, MonthPeriod, NewTransaction, ReportAggregator,
    RuleId, StoreError, Transaction, TransactionId, TransactionUpdate, DEFAULT_CATEGORY,
};
use tally_import::{add_rule, import_rule_file, ImportFormat};

use crate::cli::{BudgetCommand, Command, RulesCommand};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Runs one command against `store`, writing user-facing output to `out`.
pub async fn run<S: LedgerStore>(store: &S, command: Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Add { amount, description, category, date } => {
            let category = category.as_deref().unwrap_or(DEFAULT_CATEGORY);
            add_transaction(store, out, date.unwrap_or_else(today), &description, amount, category).await
        }
        Command::List => {
            let transactions = store.list_transactions().await?;
            print_transactions(out, &transactions)
        }
        Command::Search { query } => {
            let transactions = store.search_transactions(&query).await?;
            print_transactions(out, &transactions)
        }
        Command::Edit { id, date, description, amount, category } => {
            let update = TransactionUpdate { date, description, amount, category };
            edit_transaction(store, out, TransactionId(id), update).await
        }
        Command::Delete { id } => {
            store.delete_transaction(TransactionId(id)).await?;
            tracing::info!(id, "transaction deleted");
            writeln!(out, "Deleted transaction {id}.")?;
            Ok(())
        }
        Command::Import { file } => import_file(store, out, &file).await,
        Command::Budget(cmd) => budget(store, out, cmd).await,
        Command::Rules(cmd) => rules(store, out, cmd).await,
        Command::Report { year, month } => {
            let now = today();
            let period = MonthPeriod::new(year.unwrap_or(now.year()), month.unwrap_or(now.month()))?;
            report(store, out, period).await
        }
    }
}

// ── Transactions ──────────────────────────────────────────────────────────────

async fn add_transaction<S: LedgerStore>(
    store: &S,
    out: &mut dyn Write,
    date: NaiveDate,
    description: &str,
    amount: Money,
    category: &str,
) -> Result<()> {
    let tx = NewTransaction::new(date, description, amount, category)?;
    let stored = store.create_transaction(&tx).await?;
    tracing::info!(id = stored.id.0, "transaction added");
    writeln!(
        out,
        "Added transaction {}: {} {} {} [{}]",
        stored.id, stored.date, stored.description, stored.amount, stored.category
    )?;

    if let Some(alert) = BudgetEngine::new(store).alert_for(&stored).await? {
        writeln!(out, "{alert}")?;
    }
    Ok(())
}

async fn edit_transaction<S: LedgerStore>(
    store: &S,
    out: &mut dyn Write,
    id: TransactionId,
    update: TransactionUpdate,
) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update: pass at least one of --date, --description, --amount, --category");
    }
    let existing = store
        .get_transaction(id)
        .await?
        .ok_or(StoreError::NotFound { entity: "Transaction", id: id.0 })?;
    let replacement = update.apply(&existing)?;
    let stored = store.update_transaction(id, &replacement).await?;
    tracing::info!(id = id.0, "transaction updated");
    writeln!(out, "Updated transaction {}:", stored.id)?;
    print_transactions(out, std::slice::from_ref(&stored))
}

fn print_transactions(out: &mut dyn Write, transactions: &[Transaction]) -> Result<()> {
    if transactions.is_empty() {
        writeln!(out, "No transactions found.")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:>5}  {:<10}  {:>12}  {:<18}  Description",
        "ID", "Date", "Amount", "Category"
    )?;
    for tx in transactions {
        writeln!(
            out,
            "{:>5}  {:<10}  {:>12}  {:<18}  {}",
            tx.id.0, tx.date, tx.amount, tx.category, tx.description
        )?;
    }
    Ok(())
}

// ── Import ────────────────────────────────────────────────────────────────────

async fn import_file<S: LedgerStore>(store: &S, out: &mut dyn Write, path: &Path) -> Result<()> {
    let format = ImportFormat::from_path(path)?;
    writeln!(out, "Importing file: {}", path.display())?;

    let summary = tally_import::import_file(store, path).await?;
    for issue in &summary.diagnostics {
        writeln!(out, "{issue}")?;
    }
    writeln!(out, "{} import complete. {summary}", format.label())?;
    for alert in &summary.alerts {
        writeln!(out, "{alert}")?;
    }
    Ok(())
}

// ── Budgets ───────────────────────────────────────────────────────────────────

async fn budget<S: LedgerStore>(store: &S, out: &mut dyn Write, cmd: BudgetCommand) -> Result<()> {
    let engine = BudgetEngine::new(store);
    match cmd {
        BudgetCommand::Add { category, amount } => {
            let budget = engine.set_budget(&category, amount).await?;
            writeln!(
                out,
                "Budget set: {} {} per {} (id {})",
                budget.category, budget.limit, budget.period, budget.id
            )?;
        }
        BudgetCommand::List { month } => {
            let period = month.unwrap_or_else(|| MonthPeriod::containing(today()));
            let lines = engine.overview(period).await?;
            if lines.is_empty() {
                writeln!(out, "No budgets set.")?;
                return Ok(());
            }
            writeln!(out, "Budgets for {period}")?;
            writeln!(
                out,
                "{:>4}  {:<18}  {:>10}  {:>10}  {:>10}  Status",
                "ID", "Category", "Limit", "Spent", "Remaining"
            )?;
            for line in &lines {
                writeln!(
                    out,
                    "{:>4}  {:<18}  {:>10}  {:>10}  {:>10}  {}",
                    line.budget.id.0,
                    line.budget.category,
                    line.budget.limit,
                    line.spent,
                    line.remaining(),
                    line.status
                )?;
            }
        }
        BudgetCommand::Remove { id } => {
            engine.remove_budget(BudgetId(id)).await?;
            writeln!(out, "Removed budget {id}.")?;
        }
    }
    Ok(())
}

// ── Rules ─────────────────────────────────────────────────────────────────────

async fn rules<S: LedgerStore>(store: &S, out: &mut dyn Write, cmd: RulesCommand) -> Result<()> {
    match cmd {
        RulesCommand::Add { pattern, category } => {
            let rule = add_rule(store, &pattern, &category).await?;
            writeln!(out, "Added rule {}: /{}/ -> {}", rule.id, rule.pattern, rule.category)?;
        }
        RulesCommand::List => {
            let rules = store.list_rules().await?;
            if rules.is_empty() {
                writeln!(out, "No rules defined.")?;
                return Ok(());
            }
            for (position, rule) in rules.iter().enumerate() {
                writeln!(
                    out,
                    "{:>3}. [id {}] /{}/ -> {}",
                    position + 1,
                    rule.id,
                    rule.pattern,
                    rule.category
                )?;
            }
        }
        RulesCommand::Remove { id } => {
            store.delete_rule(RuleId(id)).await?;
            writeln!(out, "Removed rule {id}.")?;
        }
        RulesCommand::Import { file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let stored = import_rule_file(store, &content).await?;
            writeln!(out, "Imported {} rules from {}.", stored.len(), file.display())?;
        }
    }
    Ok(())
}

// ── Report ────────────────────────────────────────────────────────────────────

async fn report<S: LedgerStore>(store: &S, out: &mut dyn Write, period: MonthPeriod) -> Result<()> {
    let report = ReportAggregator::new(store).monthly_report(period).await?;

    writeln!(out, "Monthly Report: {period}")?;
    writeln!(out, "{}", "=".repeat(40))?;
    if report.is_empty() {
        writeln!(out, "No transactions found for this month.")?;
        return Ok(());
    }
    writeln!(out, "{:<16}{:>12}", "Total Income:", report.total_income)?;
    writeln!(out, "{:<16}{:>12}", "Total Expenses:", report.total_expense)?;
    writeln!(out, "{:<16}{:>12}", "Net Savings:", report.net_savings())?;
    writeln!(out)?;
    writeln!(out, "Category Breakdown:")?;
    for entry in &report.breakdown {
        writeln!(out, "{:<18}{:>12}  {}", entry.category, entry.net, report.bar(entry))?;
    }
    Ok(())
}
