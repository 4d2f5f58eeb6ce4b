use chrono::NaiveDate;
use std::fmt;
use tally_core::Money;

/// Format-independent row produced by every parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// 1-based position in the source (CSV row, or OFX transaction index).
    pub row: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    /// Explicit category from the source, already known to be non-blank.
    pub category: Option<String>,
}

/// A row that was counted as skipped, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub row: usize,
    pub reason: String,
}

impl RowIssue {
    pub fn new(row: usize, reason: impl fmt::Display) -> Self {
        Self {
            row,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {} skipped: {}", self.row, self.reason)
    }
}

/// Removes thousands separators from a decimal amount string.
///
/// A comma is only accepted between groups of three integer digits, so
/// `1,234.56` becomes `1234.56` while a decimal comma (`12,50`) or a stray
/// one (`1,2,3`) yields `None`.
pub(crate) fn strip_thousands(s: &str) -> Option<String> {
    if !s.contains(',') {
        return Some(s.to_string());
    }
    let (integer, fraction) = match s.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (s, None),
    };
    if fraction.is_some_and(|f| f.contains(',')) {
        return None;
    }

    let digits = integer.strip_prefix(['-', '+']).unwrap_or(integer);
    let all_digits = |g: &str| g.bytes().all(|b| b.is_ascii_digit());
    let mut groups = digits.split(',');
    let lead = groups.next()?;
    if lead.is_empty() || lead.len() > 3 || !all_digits(lead) {
        return None;
    }
    if !groups.all(|g| g.len() == 3 && all_digits(g)) {
        return None;
    }
    Some(s.replace(',', ""))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub records: Vec<ParsedRecord>,
    pub skipped: Vec<RowIssue>,
}
