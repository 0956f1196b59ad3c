//! Which days of a year a schedule is active: months (optionally
//! mirrored about the solstice axis), explicit and dynamic date ranges,
//! filtered by weekday/weekend/exclusion constraints.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use hearth_datetime::{Date, DateRange, DynamicDateRange, Month, Place};

use crate::error::{Error, Result};

/// Filters applied to the expanded day set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Constraints {
    pub weekdays_only: bool,
    pub weekends_only: bool,
    pub exclude: Vec<Date>,
}

impl Constraints {
    pub fn new(weekdays_only: bool, weekends_only: bool, exclude: Vec<Date>) -> Result<Self> {
        if weekdays_only && weekends_only {
            return Err(Error::ExclusiveConstraints);
        }
        Ok(Self {
            weekdays_only,
            weekends_only,
            exclude,
        })
    }

    pub fn admits(&self, day: NaiveDate) -> bool {
        let weekend = matches!(day.weekday(), Weekday::Sat | Weekday::Sun);
        if self.weekdays_only && weekend {
            return false;
        }
        if self.weekends_only && !weekend {
            return false;
        }
        !self.exclude.contains(&Date::from_naive(day))
    }
}

/// The dates block of a schedule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dates {
    pub months: Vec<Month>,
    pub mirror_months: bool,
    pub ranges: Vec<DateRange>,
    pub dynamic: Vec<DynamicDateRange>,
    pub constraints: Constraints,
}

impl Dates {
    /// The ascending active-day set for `year` at `place`, clipped to the
    /// inclusive `bound`.
    pub fn active_days(
        &self,
        year: i32,
        place: &Place,
        bound: (NaiveDate, NaiveDate),
    ) -> Vec<NaiveDate> {
        let mut days: BTreeSet<NaiveDate> = BTreeSet::new();

        let mut months: BTreeSet<Month> = self.months.iter().copied().collect();
        if self.mirror_months {
            for m in &self.months {
                months.insert(m.mirror());
            }
        }
        for month in months {
            for day in 1..=month.days(year) {
                if let Some(nd) =
                    NaiveDate::from_ymd_opt(year, month.number() as u32, day as u32)
                {
                    days.insert(nd);
                }
            }
        }

        for range in &self.ranges {
            days.extend(range.days_in_year(year));
        }
        for dynamic in &self.dynamic {
            days.extend(dynamic.evaluate(year, place).days_in_year(year));
        }

        let (lo, hi) = bound;
        days.into_iter()
            .filter(|d| *d >= lo && *d <= hi)
            .filter(|d| self.constraints.admits(*d))
            .collect()
    }
}
