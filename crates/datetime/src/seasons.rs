//! Astronomical season boundaries: mean equinox and solstice dates from
//! the series in Meeus, *Astronomical Algorithms* ch. 27. Date-level
//! precision (the mean series is within minutes of the true instants for
//! years 1000–3000), which is all annual scheduling needs.

use chrono::NaiveDate;

use crate::calendar::{Date, DateRange};

/// Julian day of the mean March equinox for `year`.
fn march_equinox_jde(year: i32) -> f64 {
    let y = (year as f64 - 2000.0) / 1000.0;
    2_451_623.809_84 + 365_242.374_04 * y + 0.051_69 * y * y - 0.004_11 * y.powi(3)
        - 0.000_57 * y.powi(4)
}

fn june_solstice_jde(year: i32) -> f64 {
    let y = (year as f64 - 2000.0) / 1000.0;
    2_451_716.567_67 + 365_241.626_03 * y + 0.003_25 * y * y + 0.008_88 * y.powi(3)
        - 0.000_30 * y.powi(4)
}

fn september_equinox_jde(year: i32) -> f64 {
    let y = (year as f64 - 2000.0) / 1000.0;
    2_451_810.217_15 + 365_242.017_67 * y - 0.115_75 * y * y + 0.003_37 * y.powi(3)
        + 0.000_78 * y.powi(4)
}

fn december_solstice_jde(year: i32) -> f64 {
    let y = (year as f64 - 2000.0) / 1000.0;
    2_451_900.059_52 + 365_242.740_49 * y - 0.062_23 * y * y - 0.008_23 * y.powi(3)
        + 0.000_32 * y.powi(4)
}

/// Convert a Julian day number to a civil date (Fliegel–Van Flandern).
fn jd_to_date(jd: f64) -> NaiveDate {
    let z = (jd + 0.5).floor() as i64;
    let mut a = z;
    if z >= 2_299_161 {
        let alpha = (((z as f64) - 1_867_216.25) / 36_524.25).floor() as i64;
        a = z + 1 + alpha - alpha / 4;
    }
    let b = a + 1524;
    let c = (((b as f64) - 122.1) / 365.25).floor() as i64;
    let d = (365.25 * c as f64).floor() as i64;
    let e = (((b - d) as f64) / 30.6001).floor() as i64;

    let day = b - d - (30.6001 * e as f64).floor() as i64;
    let month = if e < 14 { e - 1 } else { e - 13 };
    let year = if month > 2 { c - 4716 } else { c - 4715 };

    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).unwrap_or_default()
}

pub fn march_equinox(year: i32) -> NaiveDate {
    jd_to_date(march_equinox_jde(year))
}

pub fn june_solstice(year: i32) -> NaiveDate {
    jd_to_date(june_solstice_jde(year))
}

pub fn september_equinox(year: i32) -> NaiveDate {
    jd_to_date(september_equinox_jde(year))
}

pub fn december_solstice(year: i32) -> NaiveDate {
    jd_to_date(december_solstice_jde(year))
}

/// The four seasons as yearless date ranges for `year`. Each season runs
/// from its opening boundary through the day before the next one; winter
/// wraps the year boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeasonBoundaries {
    pub spring: DateRange,
    pub summer: DateRange,
    pub autumn: DateRange,
    pub winter: DateRange,
}

/// Season ranges for the northern hemisphere in `year`.
pub fn northern_seasons(year: i32) -> SeasonBoundaries {
    let mar = march_equinox(year);
    let jun = june_solstice(year);
    let sep = september_equinox(year);
    let dec = december_solstice(year);
    SeasonBoundaries {
        spring: span(mar, jun),
        summer: span(jun, sep),
        autumn: span(sep, dec),
        winter: span(dec, mar),
    }
}

/// Season ranges for the southern hemisphere: the thermal seasons swap.
pub fn southern_seasons(year: i32) -> SeasonBoundaries {
    let n = northern_seasons(year);
    SeasonBoundaries {
        spring: n.autumn,
        summer: n.winter,
        autumn: n.spring,
        winter: n.summer,
    }
}

fn span(from: NaiveDate, until: NaiveDate) -> DateRange {
    let to = until.pred_opt().unwrap_or(until);
    DateRange::new(Date::from_naive(from), Date::from_naive(to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn boundary_dates_2024() {
        assert_eq!(march_equinox(2024).to_string(), "2024-03-20");
        assert_eq!(june_solstice(2024).to_string(), "2024-06-20");
        assert_eq!(september_equinox(2024).to_string(), "2024-09-22");
        assert_eq!(december_solstice(2024).to_string(), "2024-12-21");
    }

    #[test]
    fn boundary_dates_stay_in_expected_windows() {
        for year in [1999, 2000, 2026, 2050, 2100] {
            let mar = march_equinox(year);
            assert_eq!(mar.month(), 3);
            assert!((19..=21).contains(&mar.day()), "march equinox {mar}");
            let dec = december_solstice(year);
            assert_eq!(dec.month(), 12);
            assert!((20..=23).contains(&dec.day()), "december solstice {dec}");
        }
    }

    #[test]
    fn northern_winter_wraps() {
        let seasons = northern_seasons(2024);
        assert!(seasons.winter.wraps());
        assert!(!seasons.summer.wraps());
        assert!(seasons.summer.contains("07/04".parse().unwrap()));
        assert!(seasons.winter.contains("01/15".parse().unwrap()));
    }

    #[test]
    fn southern_seasons_swap() {
        let n = northern_seasons(2024);
        let s = southern_seasons(2024);
        assert_eq!(s.summer, n.winter);
        assert_eq!(s.spring, n.autumn);
    }

    #[test]
    fn seasons_abut_without_overlap() {
        let seasons = northern_seasons(2025);
        let spring_end = seasons.spring.to();
        let summer_start = seasons.summer.from();
        let end = spring_end.in_year(2025).unwrap();
        let start = summer_start.in_year(2025).unwrap();
        assert_eq!(end.succ_opt().unwrap(), start);
    }
}
