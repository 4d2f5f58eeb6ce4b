use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tally_core::{Money, MonthPeriod};

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Import, categorize and budget personal transactions",
    long_about = "Tally imports bank exports (CSV and OFX), categorizes them with \
                  ordered regex rules, tracks monthly budgets per category and \
                  prints monthly income/expense reports."
)]
pub struct Cli {
    /// Path to the ledger database
    #[arg(long, global = true, env = "TALLY_DB", value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a transaction by hand
    Add {
        /// Signed amount; negative for an expense
        #[arg(allow_negative_numbers = true, value_parser = parse_money)]
        amount: Money,
        /// What the transaction was for
        description: String,
        /// Category (defaults to Uncategorized)
        #[arg(short, long)]
        category: Option<String>,
        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// List all transactions, newest first
    #[command(alias = "ls")]
    List,

    /// Find transactions whose description or category contains a string
    Search {
        query: String,
    },

    /// Change fields of an existing transaction
    Edit {
        id: i64,
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long, allow_negative_numbers = true, value_parser = parse_money)]
        amount: Option<Money>,
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Delete a transaction
    #[command(alias = "rm")]
    Delete {
        id: i64,
    },

    /// Import a .csv or .ofx file
    Import {
        file: PathBuf,
    },

    /// Budget management commands
    #[command(subcommand)]
    Budget(BudgetCommand),

    /// Categorization rule commands
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Monthly income and expense report
    Report {
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum BudgetCommand {
    /// Set the monthly limit for a category (replaces an existing one)
    Add {
        #[arg(short, long)]
        category: String,
        #[arg(short, long, value_parser = parse_money)]
        amount: Money,
    },
    /// Show every budget with its spending for a month
    List {
        /// Month to evaluate (YYYY-MM, defaults to the current month)
        #[arg(short, long)]
        month: Option<MonthPeriod>,
    },
    /// Remove a budget
    Remove {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Add a pattern -> category rule (pattern is a case-insensitive regex)
    Add {
        #[arg(short, long)]
        pattern: String,
        #[arg(short, long)]
        category: String,
    },
    /// List rules in match order
    List,
    /// Remove a rule
    Remove {
        id: i64,
    },
    /// Add every [[rule]] entry from a TOML file
    Import {
        file: PathBuf,
    },
}

fn parse_money(s: &str) -> Result<Money, String> {
    let value = Decimal::from_str(s.trim()).map_err(|e| format!("invalid amount '{s}': {e}"))?;
    Ok(Money::from_decimal(value))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}
