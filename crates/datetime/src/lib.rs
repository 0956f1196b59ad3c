//! Calendar and time-of-day value types for annual scheduling: yearless
//! dates and ranges, wall-clock materialisation across DST transitions,
//! and dynamic (astronomical) date-range and time-of-day evaluators.

pub mod calendar;
pub mod dynamic;
pub mod error;
pub mod place;
pub mod seasons;
pub mod solar;
pub mod timeofday;
pub mod zoned;

pub use calendar::{Date, DateRange, Month};
pub use dynamic::{DynamicDateRange, DynamicTimeOfDay};
pub use error::{Error, Result};
pub use place::Place;
pub use timeofday::TimeOfDay;
