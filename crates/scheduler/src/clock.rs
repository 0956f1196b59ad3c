//! The clock capability. Production reads the system clock; simulation
//! injects a driven clock whose readings are pre-computed ticks.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;

/// Read-only source of "now", in a requested zone.
pub trait Clock: Send + Sync {
    fn now(&self, tz: Tz) -> DateTime<Tz>;
}

/// The real wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self, tz: Tz) -> DateTime<Tz> {
        Utc::now().with_timezone(&tz)
    }
}

/// A driven clock: every read consumes the next pre-loaded tick. Once the
/// queue is drained, reads keep returning the final tick.
pub struct SimClock {
    ticks: Mutex<VecDeque<DateTime<Utc>>>,
    last: Mutex<DateTime<Utc>>,
}

impl SimClock {
    pub fn new(ticks: Vec<DateTime<Utc>>) -> Self {
        let last = ticks.first().copied().unwrap_or_else(Utc::now);
        Self {
            ticks: Mutex::new(ticks.into()),
            last: Mutex::new(last),
        }
    }

    pub fn remaining(&self) -> usize {
        self.ticks.lock().len()
    }
}

impl Clock for SimClock {
    fn now(&self, tz: Tz) -> DateTime<Tz> {
        let mut last = self.last.lock();
        if let Some(tick) = self.ticks.lock().pop_front() {
            *last = tick;
        }
        last.with_timezone(&tz)
    }
}
