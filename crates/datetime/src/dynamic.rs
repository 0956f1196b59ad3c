//! Dynamic evaluators, resolved from their configuration tags at load
//! time: times of day that move with the sun, and date ranges that move
//! with the seasons.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::calendar::{Date, DateRange};
use crate::error::{Error, Result};
use crate::place::Place;
use crate::seasons;
use crate::solar;
use crate::timeofday::TimeOfDay;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dynamic time of day
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named time-of-day evaluator: `(date, place) → TimeOfDay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DynamicTimeOfDay {
    Sunrise,
    Sunset,
}

impl DynamicTimeOfDay {
    /// The local wall-clock time of the event on `date` at `place`, or
    /// `None` when the event does not occur (polar day/night).
    pub fn evaluate(self, date: NaiveDate, place: &Place) -> Option<TimeOfDay> {
        let utc = match self {
            Self::Sunrise => solar::sunrise_utc(date, place.latitude, place.longitude)?,
            Self::Sunset => solar::sunset_utc(date, place.latitude, place.longitude)?,
        };
        let local = utc.with_timezone(&place.time_zone);
        Some(TimeOfDay::from_naive(local.time()))
    }
}

impl FromStr for DynamicTimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sunrise" => Ok(Self::Sunrise),
            "sunset" => Ok(Self::Sunset),
            _ => Err(Error::UnknownDynamicTimeOfDay(s.to_string())),
        }
    }
}

impl fmt::Display for DynamicTimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sunrise => f.write_str("sunrise"),
            Self::Sunset => f.write_str("sunset"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dynamic date range
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named date-range evaluator: `(year, place) → DateRange`. Seasons
/// follow the hemisphere of the place; the equinox/solstice tags resolve
/// to the single boundary day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DynamicDateRange {
    Spring,
    Summer,
    Autumn,
    Winter,
    SpringEquinox,
    SummerSolstice,
    AutumnEquinox,
    WinterSolstice,
}

impl DynamicDateRange {
    pub fn evaluate(self, year: i32, place: &Place) -> DateRange {
        let south = place.in_southern_hemisphere();
        let bounds = if south {
            seasons::southern_seasons(year)
        } else {
            seasons::northern_seasons(year)
        };
        match self {
            Self::Spring => bounds.spring,
            Self::Summer => bounds.summer,
            Self::Autumn => bounds.autumn,
            Self::Winter => bounds.winter,
            Self::SpringEquinox => single_day(if south {
                seasons::september_equinox(year)
            } else {
                seasons::march_equinox(year)
            }),
            Self::SummerSolstice => single_day(if south {
                seasons::december_solstice(year)
            } else {
                seasons::june_solstice(year)
            }),
            Self::AutumnEquinox => single_day(if south {
                seasons::march_equinox(year)
            } else {
                seasons::september_equinox(year)
            }),
            Self::WinterSolstice => single_day(if south {
                seasons::june_solstice(year)
            } else {
                seasons::december_solstice(year)
            }),
        }
    }
}

fn single_day(d: NaiveDate) -> DateRange {
    let date = Date::from_naive(d);
    DateRange::new(date, date)
}

impl FromStr for DynamicDateRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "autumn" | "fall" => Ok(Self::Autumn),
            "winter" => Ok(Self::Winter),
            "spring-equinox" => Ok(Self::SpringEquinox),
            "summer-solstice" => Ok(Self::SummerSolstice),
            "autumn-equinox" | "fall-equinox" => Ok(Self::AutumnEquinox),
            "winter-solstice" => Ok(Self::WinterSolstice),
            _ => Err(Error::UnknownDynamicDateRange(s.to_string())),
        }
    }
}

impl fmt::Display for DynamicDateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Winter => "winter",
            Self::SpringEquinox => "spring-equinox",
            Self::SummerSolstice => "summer-solstice",
            Self::AutumnEquinox => "autumn-equinox",
            Self::WinterSolstice => "winter-solstice",
        };
        f.write_str(tag)
    }
}
