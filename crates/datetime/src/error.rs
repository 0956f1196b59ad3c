/// Shared error type for the datetime crate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid month: {0}")]
    InvalidMonth(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("invalid time of day: {0}")]
    InvalidTimeOfDay(String),

    #[error("unknown dynamic time of day: {0}")]
    UnknownDynamicTimeOfDay(String),

    #[error("unknown dynamic date range: {0}")]
    UnknownDynamicDateRange(String),

    #[error("unknown time zone: {0}")]
    UnknownTimeZone(String),
}

pub type Result<T> = std::result::Result<T, Error>;
