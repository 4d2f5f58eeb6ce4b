use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("Invalid month: {0} (expected 1-12)")]
    InvalidMonth(u32),
    #[error("Invalid year: {0}")]
    InvalidYear(i32),
    #[error("Invalid period '{0}' (expected YYYY-MM)")]
    Unparseable(String),
}

/// A calendar month. Budgets and reports are always scoped to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthPeriod {
    year: i32,
    month: u32,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        // Both ends of the month must be representable.
        if NaiveDate::from_ymd_opt(year, month, 1).is_none()
            || NaiveDate::from_ymd_opt(year, 12, 31).is_none()
        {
            return Err(PeriodError::InvalidYear(year));
        }
        Ok(MonthPeriod { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        MonthPeriod {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn start_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month (inclusive).
    pub fn end_date(self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|first_of_next| first_of_next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn range(self) -> DateRange {
        DateRange::new(self.start_date(), self.end_date())
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthPeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| PeriodError::Unparseable(s.to_string()))?;
        let year = y
            .parse::<i32>()
            .map_err(|_| PeriodError::Unparseable(s.to_string()))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| PeriodError::Unparseable(s.to_string()))?;
        MonthPeriod::new(year, month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_rejects_out_of_range_month() {
        assert_eq!(MonthPeriod::new(2024, 0), Err(PeriodError::InvalidMonth(0)));
        assert_eq!(MonthPeriod::new(2024, 13), Err(PeriodError::InvalidMonth(13)));
        assert!(MonthPeriod::new(2024, 12).is_ok());
    }

    #[test]
    fn month_bounds() {
        let p = MonthPeriod::new(2024, 2).unwrap();
        assert_eq!(p.start_date(), date(2024, 2, 1));
        assert_eq!(p.end_date(), date(2024, 2, 29)); // leap year
        let dec = MonthPeriod::new(2023, 12).unwrap();
        assert_eq!(dec.end_date(), date(2023, 12, 31));
    }

    #[test]
    fn contains_only_same_month() {
        let p = MonthPeriod::new(2024, 5).unwrap();
        assert!(p.contains(date(2024, 5, 1)));
        assert!(p.contains(date(2024, 5, 31)));
        assert!(!p.contains(date(2024, 6, 1)));
        assert!(!p.contains(date(2023, 5, 15)));
        assert!(p.range().contains(date(2024, 5, 31)));
        assert!(!p.range().contains(date(2024, 4, 30)));
    }

    #[test]
    fn containing_date() {
        assert_eq!(
            MonthPeriod::containing(date(2024, 11, 17)),
            MonthPeriod::new(2024, 11).unwrap()
        );
    }

    #[test]
    fn display_and_parse() {
        let p = MonthPeriod::new(2024, 3).unwrap();
        assert_eq!(p.to_string(), "2024-03");
        assert_eq!("2024-03".parse::<MonthPeriod>().unwrap(), p);
        assert_eq!(" 2024-3 ".parse::<MonthPeriod>().unwrap(), p);
        assert!("2024/03".parse::<MonthPeriod>().is_err());
        assert!("2024-13".parse::<MonthPeriod>().is_err());
    }

    #[test]
    fn date_range_display() {
        let range = MonthPeriod::new(2024, 1).unwrap().range();
        assert_eq!(range.to_string(), "2024-01-01 to 2024-01-31");
    }
}
