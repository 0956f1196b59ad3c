//! Wall-clock materialisation: mapping (date, time-of-day, zone) to the
//! unique absolute instant, with defined behaviour at DST transitions.
//!
//! Spring-forward gaps resolve to the first following valid wall-clock
//! instant in the new offset; fall-back overlaps resolve to the first
//! occurrence (earlier UTC offset).

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::timeofday::TimeOfDay;

/// Materialise a wall-clock instant for `tod` on `date` in `tz`.
pub fn resolve(tz: Tz, date: NaiveDate, tod: TimeOfDay) -> DateTime<Tz> {
    resolve_naive(tz, date.and_time(tod.to_naive()))
}

/// As [`resolve`], over a pre-built naive datetime (sub-second precision
/// preserved).
pub fn resolve_naive(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => first_after_gap(tz, naive),
    }
}

/// True when the wall-clock time does not exist in `tz` (skipped hour).
pub fn in_gap(tz: Tz, naive: NaiveDateTime) -> bool {
    matches!(tz.from_local_datetime(&naive), LocalResult::None)
}

/// The last instant of `date` (23:59:59.999999999 wall clock) in `tz`.
pub fn end_of_day(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    let t = chrono::NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or_default();
    resolve_naive(tz, date.and_time(t))
}

/// Probe forward minute by minute for the first wall-clock moment that
/// exists again after a skipped range. Transitions are at worst a few
/// hours wide; the probe is bounded to a day.
fn first_after_gap(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut probe = truncate_to_minute(naive);
    for _ in 0..(24 * 60) {
        probe += Duration::minutes(1);
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => {}
        }
    }
    // Unreachable for real time zones; fall back to reading the wall
    // clock as UTC.
    tz.from_utc_datetime(&naive)
}

fn truncate_to_minute(naive: NaiveDateTime) -> NaiveDateTime {
    let t = naive.time();
    let trunc = chrono::NaiveTime::from_hms_opt(
        chrono::Timelike::hour(&t),
        chrono::Timelike::minute(&t),
        0,
    )
    .unwrap_or_default();
    naive.date().and_time(trunc)
}
