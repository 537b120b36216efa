//! The `MM-YYYY` month/year value used as the "current date" sentinel.
//!
//! The model is told to write this exact value for any open-ended role
//! ("Present", "Actual", "Actualidad", …). The value is taken from the wall
//! clock once, by the caller, and then travels inside
//! [`crate::config::ExtractionConfig`] so prompt composition stays pure.

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static RE_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0[1-9]|1[0-2])-(\d{4})$").unwrap());

/// A calendar month, rendered as zero-padded `MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthYear {
    year: u16,
    month: u8,
}

impl MonthYear {
    /// Build from a month (1–12) and a four-digit year.
    pub fn new(month: u8, year: u16) -> Option<Self> {
        if (1..=12).contains(&month) && (1000..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Snapshot of the local wall clock.
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year().clamp(1000, 9999) as u16,
            month: date.month() as u8,
        }
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn year(&self) -> u16 {
        self.year
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

/// Error returned when a string is not `MM-YYYY`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a date in MM-YYYY form, got '{0}'")]
pub struct ParseMonthYearError(pub String);

impl FromStr for MonthYear {
    type Err = ParseMonthYearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RE_MONTH_YEAR
            .captures(s.trim())
            .ok_or_else(|| ParseMonthYearError(s.to_string()))?;
        let month: u8 = caps[1]
            .parse()
            .map_err(|_| ParseMonthYearError(s.to_string()))?;
        let year: u16 = caps[2]
            .parse()
            .map_err(|_| ParseMonthYearError(s.to_string()))?;
        MonthYear::new(month, year).ok_or_else(|| ParseMonthYearError(s.to_string()))
    }
}

impl TryFrom<String> for MonthYear {
    type Error = ParseMonthYearError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthYear> for String {
    fn from(value: MonthYear) -> Self {
        value.to_string()
    }
}

/// Whether `s` is already in normalised `MM-YYYY` form.
pub fn is_month_year(s: &str) -> bool {
    RE_MONTH_YEAR.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_zero_padded() {
        let d = MonthYear::new(3, 2025).unwrap();
        assert_eq!(d.to_string(), "03-2025");
    }

    #[test]
    fn parse_accepts_month_year() {
        let d: MonthYear = "12-2025".parse().unwrap();
        assert_eq!(d.month(), 12);
        assert_eq!(d.year(), 2025);
    }

    #[test]
    fn parse_rejects_other_shapes() {
        assert!("2020".parse::<MonthYear>().is_err());
        assert!("13-2020".parse::<MonthYear>().is_err());
        assert!("1-2020".parse::<MonthYear>().is_err());
        assert!("2020-01".parse::<MonthYear>().is_err());
    }

    #[test]
    fn from_date_truncates_to_month() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(MonthYear::from_date(date).to_string(), "10-2026");
    }

    #[test]
    fn serde_uses_string_form() {
        let d = MonthYear::new(1, 2020).unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"01-2020\"");
        let back: MonthYear = serde_json::from_str("\"01-2020\"").unwrap();
        assert_eq!(back, d);
        assert!(serde_json::from_str::<MonthYear>("\"Present\"").is_err());
    }

    #[test]
    fn is_month_year_matches_normalised_dates_only() {
        assert!(is_month_year("01-2020"));
        assert!(!is_month_year("2020"));
        assert!(!is_month_year("Present"));
    }
}
