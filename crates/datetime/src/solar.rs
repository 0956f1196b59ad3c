//! Sunrise and sunset computation (NOAA "Almanac for Computers" method,
//! official zenith 90.833°). Kept in-tree; accuracy is within a couple of
//! minutes at temperate latitudes, which is ample for scheduling.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

/// Sun altitude used for official rise/set: solar disc touching the
/// horizon, refraction included.
const OFFICIAL_ZENITH: f64 = 90.833;

/// UTC instant of sunrise on `date` at (lat, lon), or `None` when the sun
/// never rises (polar night).
pub fn sunrise_utc(date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>> {
    sun_event_utc(date, latitude, longitude, true)
}

/// UTC instant of sunset on `date` at (lat, lon), or `None` when the sun
/// never sets (polar day).
pub fn sunset_utc(date: NaiveDate, latitude: f64, longitude: f64) -> Option<DateTime<Utc>> {
    sun_event_utc(date, latitude, longitude, false)
}

fn sun_event_utc(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    rising: bool,
) -> Option<DateTime<Utc>> {
    let ut_hours = sun_event_ut(date, latitude, longitude, rising)?;
    let secs = (ut_hours * 3600.0).round() as u32;
    let t = NaiveTime::from_num_seconds_from_midnight_opt(secs.min(86_399), 0)?;
    Some(Utc.from_utc_datetime(&date.and_time(t)))
}

/// Event time as UT hours in [0, 24).
fn sun_event_ut(date: NaiveDate, latitude: f64, longitude: f64, rising: bool) -> Option<f64> {
    let n = date.ordinal() as f64;
    let lng_hour = longitude / 15.0;

    let t = if rising {
        n + ((6.0 - lng_hour) / 24.0)
    } else {
        n + ((18.0 - lng_hour) / 24.0)
    };

    // Mean anomaly, then true longitude of the sun.
    let m = 0.9856 * t - 3.289;
    let l = normalize_degrees(
        m + 1.916 * sin_deg(m) + 0.020 * sin_deg(2.0 * m) + 282.634,
    );

    // Right ascension, pulled into the same quadrant as L, in hours.
    let mut ra = normalize_degrees(atan_deg(0.91764 * tan_deg(l)));
    let l_quadrant = (l / 90.0).floor() * 90.0;
    let ra_quadrant = (ra / 90.0).floor() * 90.0;
    ra = (ra + (l_quadrant - ra_quadrant)) / 15.0;

    // Declination.
    let sin_dec = 0.39782 * sin_deg(l);
    let cos_dec = sin_dec.asin().cos();

    // Local hour angle; out of range means no event at this latitude.
    let cos_h = (cos_deg(OFFICIAL_ZENITH) - sin_dec * sin_deg(latitude))
        / (cos_dec * cos_deg(latitude));
    if !(-1.0..=1.0).contains(&cos_h) {
        return None;
    }

    let h = if rising {
        (360.0 - acos_deg(cos_h)) / 15.0
    } else {
        acos_deg(cos_h) / 15.0
    };

    let mean_t = h + ra - 0.06571 * t - 6.622;
    Some((mean_t - lng_hour).rem_euclid(24.0))
}

fn normalize_degrees(d: f64) -> f64 {
    d.rem_euclid(360.0)
}

fn sin_deg(d: f64) -> f64 {
    d.to_radians().sin()
}

fn cos_deg(d: f64) -> f64 {
    d.to_radians().cos()
}

fn tan_deg(d: f64) -> f64 {
    d.to_radians().tan()
}

fn atan_deg(x: f64) -> f64 {
    x.atan().to_degrees()
}

fn acos_deg(x: f64) -> f64 {
    x.acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn greenwich_equinox_sunrise_near_six() {
        // At an equinox, sunrise at Greenwich is close to 06:00 UT.
        let d = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let rise = sunrise_utc(d, 51.4769, 0.0).unwrap();
        assert!(
            (5..=6).contains(&rise.hour()),
            "expected sunrise near 06:00 UT, got {rise}"
        );
    }

    #[test]
    fn greenwich_equinox_sunset_near_eighteen() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let set = sunset_utc(d, 51.4769, 0.0).unwrap();
        assert!(
            (18..=19).contains(&set.hour()),
            "expected sunset near 18:00 UT, got {set}"
        );
    }

    #[test]
    fn winter_days_shorter_than_summer() {
        // Near-zero longitude keeps both events on the same UTC date.
        let lat = 51.4769;
        let lon = 0.0;
        let winter = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        let summer = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let wlen = sunset_utc(winter, lat, lon).unwrap() - sunrise_utc(winter, lat, lon).unwrap();
        let slen = sunset_utc(summer, lat, lon).unwrap() - sunrise_utc(summer, lat, lon).unwrap();
        assert!(wlen < slen, "winter day {wlen} not shorter than summer {slen}");
        assert!(wlen.num_hours() >= 7 && wlen.num_hours() <= 10);
        assert!(slen.num_hours() >= 14 && slen.num_hours() <= 17);
    }

    #[test]
    fn polar_night_has_no_sunrise() {
        // Longyearbyen in late December.
        let d = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        assert!(sunrise_utc(d, 78.22, 15.64).is_none());
    }

    #[test]
    fn polar_day_has_no_sunset() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        assert!(sunset_utc(d, 78.22, 15.64).is_none());
    }
}
