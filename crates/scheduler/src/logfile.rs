//! The scheduler's structured event stream: one JSON object per line,
//! scannable back by offline consumers (summaries, UIs, tests).

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timestamps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A zoned instant as it appears in the log: RFC 3339 with the zone
/// abbreviation appended, e.g. `2025-01-01T00:00:01.000000000-08:00 PST`.
/// The abbreviation is for humans; the offset carries the instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Stamp {
    pub at: DateTime<FixedOffset>,
    pub abbrev: String,
}

impl Stamp {
    pub fn new(dt: &DateTime<Tz>) -> Self {
        Self {
            at: dt.fixed_offset(),
            abbrev: dt.format("%Z").to_string(),
        }
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.at.to_rfc3339_opts(SecondsFormat::Nanos, false),
            self.abbrev
        )
    }
}

impl std::str::FromStr for Stamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (ts, abbrev) = match s.rsplit_once(' ') {
            Some((ts, abbrev)) => (ts, abbrev.to_string()),
            None => (s, String::new()),
        };
        Ok(Self {
            at: DateTime::parse_from_rfc3339(ts)?,
            abbrev,
        })
    }
}

impl Serialize for Stamp {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Stamp {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Format a signed delay for the log, e.g. `10ms`, `-1m 30s`.
pub fn format_delay(delay: chrono::Duration) -> String {
    let std = delay.abs().to_std().unwrap_or_default();
    let body = humantime::format_duration(std).to_string();
    if delay < chrono::Duration::zero() {
        format!("-{body}")
    } else {
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Day,
    Pending,
    TooLate,
    Completed,
    Failed,
    YearEnd,
}

/// One scheduler event. Field presence depends on `msg`; absent fields
/// are omitted from the JSON line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub msg: EventKind,
    #[serde(rename = "mod")]
    pub module: String,
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<String>,
    #[serde(rename = "pre-args", default, skip_serializing_if = "Option::is_none")]
    pub pre_args: Option<Vec<String>>,
    #[serde(rename = "pre-result", default, skip_serializing_if = "Option::is_none")]
    pub pre_result: Option<bool>,
    #[serde(rename = "dry-run", default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<Stamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<Stamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<Stamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(
        rename = "year-end-delay",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub year_end_delay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "#actions", default, skip_serializing_if = "Option::is_none")]
    pub num_actions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl Event {
    pub fn new(msg: EventKind, schedule: impl Into<String>) -> Self {
        Self {
            msg,
            module: "scheduler".to_string(),
            schedule: schedule.into(),
            id: None,
            device: None,
            op: None,
            args: None,
            pre: None,
            pre_args: None,
            pre_result: None,
            dry_run: None,
            now: None,
            due: None,
            started: None,
            delay: None,
            loc: None,
            year: None,
            year_end_delay: None,
            date: None,
            num_actions: None,
            err: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Writer & scanner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared line-JSON writer for scheduler events. Cloning shares the sink.
#[derive(Clone)]
pub struct EventLog {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl EventLog {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// An event log that drops everything.
    pub fn discard() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    pub fn emit(&self, event: &Event) -> Result<()> {
        let line = serde_json::to_string(event)?;
        let mut sink = self.sink.lock();
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        Ok(())
    }
}

/// Iterator over events in a line-JSON stream. Stops at the first
/// malformed record, yielding its error last.
pub struct EventScanner<R: BufRead> {
    lines: std::io::Lines<R>,
    failed: bool,
}

impl<R: BufRead> EventScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for EventScanner<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(Error::Io(e)));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return match serde_json::from_str(&line) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    self.failed = true;
                    Some(Err(Error::LogRecord(e)))
                }
            };
        }
    }
}

/// All events of a stream, failing at the first malformed record.
pub fn read_all<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    EventScanner::new(reader).collect()
}

/// All parseable events plus the accumulated parse errors.
pub fn read_lenient<R: BufRead>(reader: R) -> (Vec<Event>, Vec<Error>) {
    let mut events = Vec::new();
    let mut errors = Vec::new();
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                errors.push(Error::Io(e));
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(event) => events.push(event),
            Err(e) => errors.push(Error::LogRecord(e)),
        }
    }
    (events, errors)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-schedule event counts folded from a scanned stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub days: usize,
    pub pending: usize,
    pub completed: usize,
    /// Completed with a false precondition result.
    pub aborted: usize,
    pub failed: usize,
    pub too_late: usize,
    pub year_ends: usize,
}

pub fn summarize<'a>(events: impl IntoIterator<Item = &'a Event>) -> BTreeMap<String, ScheduleSummary> {
    let mut out: BTreeMap<String, ScheduleSummary> = BTreeMap::new();
    for event in events {
        let entry = out.entry(event.schedule.clone()).or_default();
        match event.msg {
            EventKind::Day => entry.days += 1,
            EventKind::Pending => entry.pending += 1,
            EventKind::TooLate => entry.too_late += 1,
            EventKind::Completed => {
                entry.completed += 1;
                if event.pre_result == Some(false) {
                    entry.aborted += 1;
                }
            }
            EventKind::Failed => entry.failed += 1,
            EventKind::YearEnd => entry.year_ends += 1,
        }
    }
    out
}
