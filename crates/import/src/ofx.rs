use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tally_core::Money;
use thiserror::Error;

use crate::record::{strip_thousands, ParseOutcome, ParsedRecord, RowIssue};

#[derive(Debug, Clone, Default)]
pub struct OfxTransaction {
    pub trn_type: Option<String>,
    pub fit_id: Option<String>,
    /// Raw `DTPOSTED` value, e.g. `20240115120000[-5:EST]`.
    pub posted: Option<String>,
    /// Raw `TRNAMT` value.
    pub amount: Option<String>,
    pub name: Option<String>,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OfxStatement {
    pub account_id: Option<String>,
    pub currency: Option<String>,
    pub transactions: Vec<OfxTransaction>,
}

#[derive(Error, Debug)]
pub enum OfxError {
    #[error("Missing <OFX> root element")]
    MissingRoot,
    #[error("Failed to parse OFX: {0}")]
    Malformed(String),
    #[error("invalid posted date '{0}'")]
    InvalidDate(String),
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
}

/// Tag scanner that reads both OFX 2 XML (closed leaf elements) and OFX 1.x
/// SGML (leaf values run to the next tag).
pub struct OfxParser;

impl OfxParser {
    pub fn parse(data: &str) -> Result<OfxStatement, OfxError> {
        // Everything before the first tag is the SGML/XML header block.
        let Some(start) = data.find('<') else {
            return Err(OfxError::MissingRoot);
        };

        let mut statement = OfxStatement::default();
        let mut saw_root = false;
        let mut current_trx: Option<OfxTransaction> = None;

        for chunk in data[start..].split('<').skip(1) {
            let Some((raw_tag, text)) = chunk.split_once('>') else {
                return Err(OfxError::Malformed(format!(
                    "unterminated tag '<{}'",
                    chunk.trim()
                )));
            };

            let raw_tag = raw_tag.trim();
            // <?xml ...?>, <?OFX ...?>, <!-- comments -->
            if raw_tag.starts_with('?') || raw_tag.starts_with('!') {
                continue;
            }

            let (closing, tag) = match raw_tag.strip_prefix('/') {
                Some(rest) => (true, rest),
                None => (false, raw_tag),
            };
            let tag_name = tag
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_uppercase();
            let value = unescape(text.trim());

            match (closing, tag_name.as_str()) {
                (false, "OFX") => saw_root = true,
                (false, "STMTTRN") => {
                    if current_trx.is_some() {
                        return Err(OfxError::Malformed("nested <STMTTRN>".to_string()));
                    }
                    current_trx = Some(OfxTransaction::default());
                }
                (true, "STMTTRN") => match current_trx.take() {
                    Some(trx) => statement.transactions.push(trx),
                    None => {
                        return Err(OfxError::Malformed(
                            "</STMTTRN> without matching <STMTTRN>".to_string(),
                        ))
                    }
                },
                (false, name) if !value.is_empty() => match current_trx.as_mut() {
                    Some(trx) => match name {
                        "TRNTYPE" => trx.trn_type = Some(value),
                        "FITID" => trx.fit_id = Some(value),
                        "DTPOSTED" => trx.posted = Some(value),
                        "TRNAMT" => trx.amount = Some(value),
                        "NAME" => trx.name = Some(value),
                        "MEMO" => trx.memo = Some(value),
                        _ => {}
                    },
                    None => match name {
                        "ACCTID" => statement.account_id = Some(value),
                        "CURDEF" => statement.currency = Some(value),
                        _ => {}
                    },
                },
                _ => {}
            }
        }

        if !saw_root {
            return Err(OfxError::MissingRoot);
        }
        if current_trx.is_some() {
            return Err(OfxError::Malformed("unterminated <STMTTRN> block".to_string()));
        }

        Ok(statement)
    }
}

impl OfxStatement {
    /// Converts transactions to uniform records. A bad date or amount skips
    /// only that transaction; rows are numbered by transaction index.
    pub fn into_outcome(self) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        for (idx, trx) in self.transactions.into_iter().enumerate() {
            let row = idx + 1;

            let posted = trx.posted.unwrap_or_default();
            let Some(date) = parse_ofx_date(&posted) else {
                outcome.skipped.push(RowIssue::new(row, OfxError::InvalidDate(posted)));
                continue;
            };

            let raw_amount = trx.amount.unwrap_or_default();
            let Some(amount) = parse_ofx_amount(&raw_amount) else {
                outcome
                    .skipped
                    .push(RowIssue::new(row, OfxError::InvalidAmount(raw_amount)));
                continue;
            };

            let name = trx.name.unwrap_or_default();
            let description = match trx.memo.as_deref().map(str::trim) {
                Some(memo) if !memo.is_empty() => format!("{} - {}", name.trim(), memo),
                _ => name.trim().to_string(),
            };

            outcome.records.push(ParsedRecord {
                row,
                date,
                description,
                amount,
                category: None,
            });
        }

        outcome
    }
}

/// `YYYYMMDD[HHMMSS[.XXX][TZ]]`: only the first eight characters are used.
fn parse_ofx_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim().get(..8)?;
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let y: i32 = s[0..4].parse().ok()?;
    let m: u32 = s[4..6].parse().ok()?;
    let d: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn parse_ofx_amount(s: &str) -> Option<Money> {
    let s = strip_thousands(s.trim())?;
    let dec = Decimal::from_str(&s).ok()?;
    let amount = Money::from_decimal(dec);
    amount.checked_cents().map(|_| amount)
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn parse(data: &[u8]) -> Result<OfxStatement, OfxError> {
    let content = String::from_utf8_lossy(data);
    OfxParser::parse(&content)
}
