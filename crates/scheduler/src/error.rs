use chrono::NaiveDate;

/// Shared error type for the scheduler crate.
///
/// Construction-time failures (unknown devices, malformed specs, ordering
/// conflicts) are fatal for the schedule that carries them; execution-time
/// failures are recorded against the single action and never stop a
/// schedule.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("device {device} has no operation {op}")]
    UnknownOperation { device: String, op: String },

    #[error("device {device} has no condition {condition}")]
    UnknownCondition { device: String, condition: String },

    #[error("schedule {schedule} has no device for action {action}")]
    MissingDevice { schedule: String, action: String },

    #[error("duplicate schedule name: {0}")]
    DuplicateSchedule(String),

    #[error("repeat interval must be positive")]
    InvalidInterval,

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("weekdays and weekends are mutually exclusive")]
    ExclusiveConstraints,

    #[error("action {action}: before and after are mutually exclusive")]
    OrderBothSet { action: String },

    #[error("action {action}: ordering constraint references itself")]
    OrderSelfReference { action: String },

    #[error("action {action}: ordering referent {referent} not found")]
    OrderUnknownReferent { action: String, referent: String },

    #[error("action {action}: referent {referent} is not co-scheduled at the same time")]
    OrderUnequalDue { action: String, referent: String },

    #[error("no valid time for action {action} on {date}")]
    Unresolvable { action: String, date: NaiveDate },

    #[error("operation timed out after {0:?}")]
    OpTimeout(std::time::Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("device: {0}")]
    Device(String),

    #[error("task: {0}")]
    Task(String),

    #[error(transparent)]
    Datetime(#[from] hearth_datetime::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("log record: {0}")]
    LogRecord(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// User or runner cancellation, as distinct from an operation timeout.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
