//! Yearless calendar values: months, month/day dates, and inclusive date
//! ranges (wrap-around permitted, e.g. a winter that spans the year
//! boundary).

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Month
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// A calendar month, 1 (January) through 12 (December).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month(u8);

impl Month {
    pub fn new(n: u8) -> Result<Self> {
        if (1..=12).contains(&n) {
            Ok(Self(n))
        } else {
            Err(Error::InvalidMonth(n.to_string()))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        MONTH_NAMES[(self.0 - 1) as usize]
    }

    /// The month equidistant from the solstice axis: Jan↔Dec, Feb↔Nov, …
    pub fn mirror(self) -> Month {
        Month(13 - self.0)
    }

    pub fn days(self, year: i32) -> u8 {
        match self.0 {
            2 => {
                if is_leap_year(year) {
                    29
                } else {
                    28
                }
            }
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }

    /// Parse a comma-separated month list, e.g. `"jan,feb"` or `"1,2"`.
    pub fn parse_list(s: &str) -> Result<Vec<Month>> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Month::from_str)
            .collect()
    }
}

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

impl FromStr for Month {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if let Ok(n) = lower.parse::<u8>() {
            return Month::new(n);
        }
        for (i, name) in MONTH_NAMES.iter().enumerate() {
            if lower == *name || (lower.len() >= 3 && name.starts_with(&lower)) {
                return Ok(Month(i as u8 + 1));
            }
        }
        Err(Error::InvalidMonth(s.to_string()))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name()[..3])
    }
}

impl TryFrom<String> for Month {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Month> for String {
    fn from(m: Month) -> String {
        m.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Date (month/day without a year)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A month/day pair with no year attached. Feb 29 is a valid `Date`; it
/// simply has no concrete instance in non-leap years.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Date {
    month: Month,
    day: u8,
}

impl Date {
    pub fn new(month: Month, day: u8) -> Result<Self> {
        // Validate against the month's longest form (leap February).
        if day == 0 || day > month.days(2024) {
            return Err(Error::InvalidDate(format!("{month}-{day:02}")));
        }
        Ok(Self { month, day })
    }

    pub fn month(self) -> Month {
        self.month
    }

    pub fn day(self) -> u8 {
        self.day
    }

    /// The concrete date in `year`, or `None` for Feb 29 off leap years.
    pub fn in_year(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month.number() as u32, self.day as u32)
    }

    pub fn from_naive(d: NaiveDate) -> Self {
        Self {
            month: Month(d.month() as u8),
            day: d.day() as u8,
        }
    }

    /// Parse a comma-separated date list, e.g. `"jan-02,feb-02"`.
    pub fn parse_list(s: &str) -> Result<Vec<Date>> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Date::from_str)
            .collect()
    }
}

impl FromStr for Date {
    type Err = Error;

    /// Accepts `MM/DD` and `<month>-<day>` where the month may be a name
    /// or a number: `01/02`, `jan-02`, `january-2`.
    fn from_str(s: &str) -> Result<Self> {
        let (m, d) = s
            .split_once('/')
            .or_else(|| s.rsplit_once('-'))
            .ok_or_else(|| Error::InvalidDate(s.to_string()))?;
        let month: Month = m.parse()?;
        let day: u8 = d
            .trim()
            .parse()
            .map_err(|_| Error::InvalidDate(s.to_string()))?;
        Date::new(month, day)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month.number(), self.day)
    }
}

impl TryFrom<String> for Date {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Date> for String {
    fn from(d: Date) -> String {
        d.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DateRange
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An inclusive range over yearless dates. When `from > to` the range
/// wraps across the year boundary (Dec 21 : Mar 19 covers both the head
/// and the tail of a calendar year).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateRange {
    from: Date,
    to: Date,
}

impl DateRange {
    pub fn new(from: Date, to: Date) -> Self {
        Self { from, to }
    }

    pub fn from(self) -> Date {
        self.from
    }

    pub fn to(self) -> Date {
        self.to
    }

    pub fn wraps(self) -> bool {
        self.from > self.to
    }

    pub fn contains(self, d: Date) -> bool {
        if self.wraps() {
            d >= self.from || d <= self.to
        } else {
            d >= self.from && d <= self.to
        }
    }

    /// All concrete days of the range within one calendar year, ascending.
    /// A wrapping range contributes both its tail (Jan..to) and its head
    /// (from..Dec 31) of the same year.
    pub fn days_in_year(self, year: i32) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut push_span = |from: Date, to: Date| {
            let start = clamp_into_year(from, year);
            let end = clamp_into_year(to, year);
            let mut d = start;
            while d <= end {
                out.push(d);
                match d.succ_opt() {
                    Some(n) => d = n,
                    None => break,
                }
            }
        };
        if self.wraps() {
            push_span(Date { month: Month(1), day: 1 }, self.to);
            push_span(self.from, Date { month: Month(12), day: 31 });
        } else {
            push_span(self.from, self.to);
        }
        out
    }
}

/// Resolve a yearless date in `year`, sliding Feb 29 to Feb 28 off leap
/// years so range endpoints stay meaningful.
fn clamp_into_year(d: Date, year: i32) -> NaiveDate {
    match d.in_year(year) {
        Some(nd) => nd,
        // Only Feb 29 has no instance in a year.
        None => NaiveDate::from_ymd_opt(year, 2, 28).unwrap_or_default(),
    }
}

impl FromStr for DateRange {
    type Err = Error;

    /// Parses `<date>:<date>`, e.g. `02/01:02/10` or `dec-21:mar-19`.
    fn from_str(s: &str) -> Result<Self> {
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidDateRange(s.to_string()))?;
        Ok(DateRange::new(a.trim().parse()?, b.trim().parse()?))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.from, self.to)
    }
}

impl TryFrom<String> for DateRange {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DateRange> for String {
    fn from(r: DateRange) -> String {
        r.to_string()
    }
}
