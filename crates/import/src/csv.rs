use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tally_core::Money;
use thiserror::Error;

use crate::record::{strip_thousands, ParseOutcome, ParsedRecord, RowIssue};

/// The only accepted date layout.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Row-level failures. None of these abort a file.
#[derive(Error, Debug)]
pub enum CsvError {
    #[error("malformed row ({0})")]
    Malformed(#[from] csv::Error),
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
}

/// Parses `date,description,amount[,category]` rows.
///
/// Rows with fewer than three fields are ignored. A first row whose date does
/// not parse is taken as the header. Any other bad date or amount is reported
/// in [`ParseOutcome::skipped`] with its 1-based row number.
pub fn parse(data: &[u8]) -> ParseOutcome {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut outcome = ParseOutcome::default();

    for (idx, result) in reader.records().enumerate() {
        let row = idx + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                outcome.skipped.push(RowIssue::new(row, CsvError::from(e)));
                continue;
            }
        };

        if record.len() < 3 {
            tracing::debug!(row, fields = record.len(), "ignoring short csv row");
            continue;
        }

        let date = match parse_date(&record[0]) {
            Ok(date) => date,
            Err(_) if idx == 0 => {
                tracing::debug!("treating first csv row as header");
                continue;
            }
            Err(e) => {
                outcome.skipped.push(RowIssue::new(row, e));
                continue;
            }
        };

        let amount = match parse_amount(&record[2]) {
            Ok(amount) => amount,
            Err(e) => {
                outcome.skipped.push(RowIssue::new(row, e));
                continue;
            }
        };

        let category = record
            .get(3)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        outcome.records.push(ParsedRecord {
            row,
            date,
            description: record[1].trim().to_string(),
            amount,
            category,
        });
    }

    outcome
}

fn parse_date(s: &str) -> Result<NaiveDate, CsvError> {
    let s = s.trim();
    // chrono accepts unpadded fields (2024-5-1); the layout is strictly YYYY-MM-DD.
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return Err(CsvError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| CsvError::InvalidDate(s.to_string()))
}

/// Accepts plain signed decimals plus common export noise: currency symbol,
/// thousands separators and accounting parentheses for negatives.
fn parse_amount(s: &str) -> Result<Money, CsvError> {
    let s = s.trim();
    let (negative, body) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let cleaned = strip_thousands(&body.replace(['$', ' '], ""))
        .ok_or_else(|| CsvError::InvalidAmount(s.to_string()))?;
    let mut dec =
        Decimal::from_str(&cleaned).map_err(|_| CsvError::InvalidAmount(s.to_string()))?;
    if negative {
        dec = -dec;
    }
    let amount = Money::from_decimal(dec);
    if amount.checked_cents().is_none() {
        return Err(CsvError::InvalidAmount(s.to_string()));
    }
    Ok(amount)
}
