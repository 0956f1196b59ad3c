//! Compiled action and schedule specifications. Configuration is bound
//! and validated once, against the device registry, before anything runs.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use hearth_datetime::{DynamicTimeOfDay, Place, TimeOfDay};

use crate::device::Device;
use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Due time
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// When an action is due within a day: a literal wall-clock time, or a
/// dynamic time with a signed offset (`sunrise-30m`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Due {
    Literal(TimeOfDay),
    Dynamic {
        which: DynamicTimeOfDay,
        offset: Duration,
    },
}

impl Due {
    /// Parse a single due-time: `HH:MM[:SS]` or `<tag>[±duration]`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(Due::Literal(s.parse::<TimeOfDay>()?));
        }
        let split = s.find(['+', '-']);
        let (tag, offset) = match split {
            Some(i) => {
                let (tag, rest) = s.split_at(i);
                let sign = if rest.starts_with('-') { -1 } else { 1 };
                let body = &rest[1..];
                let std = humantime::parse_duration(body)
                    .map_err(|_| Error::InvalidDuration(rest.to_string()))?;
                let magnitude = Duration::from_std(std)
                    .map_err(|_| Error::InvalidDuration(rest.to_string()))?;
                (tag, magnitude * sign)
            }
            None => (s, Duration::zero()),
        };
        Ok(Due::Dynamic {
            which: tag.parse::<DynamicTimeOfDay>()?,
            offset,
        })
    }

    /// Parse a comma-separated list of due-times.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Due::parse)
            .collect()
    }

    /// The wall-clock time this due resolves to on `date` at `place`, or
    /// `None` when the underlying dynamic event does not occur. Offsets
    /// saturate at the day's bounds.
    pub fn resolve(&self, date: NaiveDate, place: &Place) -> Option<TimeOfDay> {
        match self {
            Due::Literal(tod) => Some(*tod),
            Due::Dynamic { which, offset } => {
                let base = which.evaluate(date, place)?;
                let shifted = date.and_time(base.to_naive()) + *offset;
                if shifted.date() < date {
                    Some(TimeOfDay::default())
                } else if shifted.date() > date {
                    Some(TimeOfDay::end_of_day())
                } else {
                    Some(TimeOfDay::from_naive(shifted.time()))
                }
            }
        }
    }
}

impl fmt::Display for Due {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Due::Literal(tod) => tod.fmt(f),
            Due::Dynamic { which, offset } => {
                if offset.is_zero() {
                    which.fmt(f)
                } else {
                    let std = offset.abs().to_std().unwrap_or_default();
                    let sign = if *offset < Duration::zero() { '-' } else { '+' };
                    write!(f, "{which}{sign}{}", humantime::format_duration(std))
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Repeats, preconditions, ordering hints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Periodic re-invocation within one calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatSpec {
    pub interval: Duration,
    /// Total number of occurrences including the first; 0 fills the day.
    pub count: usize,
}

impl RepeatSpec {
    pub fn new(interval: Duration, count: usize) -> Result<Self> {
        if interval <= Duration::zero() {
            return Err(Error::InvalidInterval);
        }
        Ok(Self { interval, count })
    }
}

/// A device-side boolean check evaluated just before the operation runs.
#[derive(Clone)]
pub struct Precondition {
    pub device_name: String,
    pub device: Arc<dyn Device>,
    pub condition: String,
    pub negated: bool,
    pub args: Vec<String>,
}

impl Precondition {
    /// Compile a precondition; a leading `!` on the condition name
    /// negates the result.
    pub fn new(
        device_name: &str,
        device: Arc<dyn Device>,
        condition: &str,
        args: Vec<String>,
    ) -> Result<Self> {
        let (negated, name) = match condition.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, condition),
        };
        if !device.conditions().iter().any(|c| c == name) {
            return Err(Error::UnknownCondition {
                device: device_name.to_string(),
                condition: name.to_string(),
            });
        }
        Ok(Self {
            device_name: device_name.to_string(),
            device,
            condition: name.to_string(),
            negated,
            args,
        })
    }

    /// The name as configured, negation marker included.
    pub fn display_name(&self) -> String {
        if self.negated {
            format!("!{}", self.condition)
        } else {
            self.condition.clone()
        }
    }
}

impl fmt::Debug for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Precondition")
            .field("device", &self.device_name)
            .field("condition", &self.display_name())
            .field("args", &self.args)
            .finish()
    }
}

/// Pairwise co-scheduling constraint against a named peer action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderHint {
    Before(String),
    After(String),
}

impl OrderHint {
    pub fn referent(&self) -> &str {
        match self {
            OrderHint::Before(name) | OrderHint::After(name) => name,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Action & annual specs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One fully compiled action: a device operation with its due time,
/// optional repeat, precondition, and ordering hint. The device and the
/// operation name are resolved at construction.
#[derive(Clone)]
pub struct ActionSpec {
    pub name: String,
    pub due: Due,
    pub repeat: Option<RepeatSpec>,
    pub device_name: String,
    pub device: Arc<dyn Device>,
    pub op: String,
    pub args: Vec<String>,
    pub precondition: Option<Precondition>,
    pub order: Option<OrderHint>,
}

impl ActionSpec {
    /// Compile an action, validating the operation against the device.
    pub fn new(
        name: &str,
        due: Due,
        device_name: &str,
        device: Arc<dyn Device>,
        op: &str,
        args: Vec<String>,
    ) -> Result<Self> {
        if !device.operations().iter().any(|o| o == op) {
            return Err(Error::UnknownOperation {
                device: device_name.to_string(),
                op: op.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            due,
            repeat: None,
            device_name: device_name.to_string(),
            device,
            op: op.to_string(),
            args,
            precondition: None,
            order: None,
        })
    }

    pub fn with_repeat(mut self, repeat: RepeatSpec) -> Self {
        self.repeat = Some(repeat);
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn with_order(mut self, order: OrderHint) -> Self {
        self.order = Some(order);
        self
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("due", &self.due.to_string())
            .field("device", &self.device_name)
            .field("op", &self.op)
            .field("repeat", &self.repeat)
            .field("order", &self.order)
            .finish()
    }
}

/// A named schedule: which days it is active (see [`crate::dates::Dates`])
/// and, in declaration order, the actions it runs on each of those days.
#[derive(Clone, Debug)]
pub struct AnnualSpec {
    pub name: String,
    pub dates: crate::dates::Dates,
    pub actions: Vec<Arc<ActionSpec>>,
}

impl AnnualSpec {
    /// Validate the statically checkable ordering constraints of the
    /// action list: exclusivity, self-reference, referent existence, and
    /// (for literal due times) co-scheduling.
    pub fn validate_ordering(&self) -> Result<()> {
        for action in &self.actions {
            let Some(order) = &action.order else {
                continue;
            };
            let referent = order.referent();
            if referent == action.name {
                return Err(Error::OrderSelfReference {
                    action: action.name.clone(),
                });
            }
            let Some(peer) = self.actions.iter().find(|a| a.name == referent) else {
                return Err(Error::OrderUnknownReferent {
                    action: action.name.clone(),
                    referent: referent.to_string(),
                });
            };
            if let (Due::Literal(a), Due::Literal(b)) = (&action.due, &peer.due) {
                if a != b {
                    return Err(Error::OrderUnequalDue {
                        action: action.name.clone(),
                        referent: referent.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
