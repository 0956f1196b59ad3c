//! Observer location: latitude/longitude plus the IANA time zone the
//! schedules are evaluated in.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where schedules run. Latitude and longitude are degrees (north and
/// east positive); the time zone governs all wall-clock resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "tz_name")]
    pub time_zone: Tz,
}

impl Place {
    pub fn new(latitude: f64, longitude: f64, time_zone: &str) -> Result<Self> {
        let tz = time_zone
            .parse::<Tz>()
            .map_err(|_| Error::UnknownTimeZone(time_zone.to_string()))?;
        Ok(Self {
            latitude,
            longitude,
            time_zone: tz,
        })
    }

    pub fn in_southern_hemisphere(&self) -> bool {
        self.latitude < 0.0
    }
}

/// Serialize a `chrono_tz::Tz` as its IANA name.
pub mod tz_name {
    use chrono_tz::Tz;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tz: &Tz, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Tz, D::Error> {
        let name = String::deserialize(de)?;
        name.parse::<Tz>().map_err(serde::de::Error::custom)
    }
}
