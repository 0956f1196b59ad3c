//! The per-schedule runtime: drives the annual scheduler day by day,
//! waits on the clock until each action is due, invokes the device
//! operation under its timeout, and records outcomes, rolling from year
//! to year until cancelled.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use tokio_util::sync::CancellationToken;

use hearth_datetime::{zoned, Place};

use crate::annual::Active;
use crate::clock::Clock;
use crate::device::{discard_output, OpRequest, OutputWriter};
use crate::error::{Error, Result};
use crate::logfile::{format_delay, Event, EventKind, EventLog, Stamp};
use crate::spec::AnnualSpec;
use crate::status::{next_invocation_id, StatusRecord, StatusRecorder};

/// Actions more than this far past due at dispatch time are logged once
/// as too-late and skipped.
fn too_late_threshold() -> Duration {
    Duration::minutes(1)
}

/// One schedule's runtime. Construct per schedule; run once.
pub struct ScheduleRuntime {
    spec: Arc<AnnualSpec>,
    place: Place,
    clock: Arc<dyn Clock>,
    status: Arc<StatusRecorder>,
    events: EventLog,
    out: OutputWriter,
    dry_run: bool,
    cancel: CancellationToken,
}

impl ScheduleRuntime {
    pub fn new(
        spec: Arc<AnnualSpec>,
        place: Place,
        clock: Arc<dyn Clock>,
        status: Arc<StatusRecorder>,
        events: EventLog,
    ) -> Self {
        Self {
            spec,
            place,
            clock,
            status,
            events,
            out: discard_output(),
            dry_run: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Skip device calls; logging, status, and waiting are unchanged.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sink for device output during operations.
    pub fn with_output(mut self, out: OutputWriter) -> Self {
        self.out = out;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run from `start`, rolling over year ends, until cancelled (or
    /// until the end of `until`'s day when a bound is given).
    pub async fn run(&self, start: NaiveDate, until: Option<NaiveDate>) -> Result<()> {
        let mut from = start;
        loop {
            let year = from.year();
            let Some(year_last) = NaiveDate::from_ymd_opt(year, 12, 31) else {
                return Ok(());
            };
            let to = match until {
                Some(u) => u.min(year_last),
                None => year_last,
            };
            self.run_to_year_end(from, to, to == year_last).await?;
            if let Some(u) = until {
                if to >= u {
                    return Ok(());
                }
            }
            match NaiveDate::from_ymd_opt(year + 1, 1, 1) {
                Some(next) => from = next,
                None => return Ok(()),
            }
        }
    }

    /// One year segment: every qualifying day in `[from..to]`, then (for
    /// a full year) the wait out to the year's last instant.
    async fn run_to_year_end(&self, from: NaiveDate, to: NaiveDate, full_year: bool) -> Result<()> {
        let year = from.year();
        let tz = self.place.time_zone;

        for scheduled in self.spec.days(year, &self.place, (from, to)) {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut event = Event::new(EventKind::Day, &self.spec.name);
            event.date = Some(scheduled.date);
            event.num_actions = Some(scheduled.specs.len());
            self.events.emit(&event)?;
            tracing::debug!(
                schedule = %self.spec.name,
                date = %scheduled.date,
                actions = scheduled.specs.len(),
                "new day"
            );

            let actives = match scheduled.active(&self.place) {
                Ok(actives) => actives,
                Err(e) => {
                    tracing::warn!(
                        schedule = %self.spec.name,
                        date = %scheduled.date,
                        error = %e,
                        "cannot materialise day, skipping"
                    );
                    continue;
                }
            };
            for active in actives {
                self.dispatch(&active).await?;
            }
        }

        if full_year {
            let end = zoned::end_of_day(tz, to);
            let now = self.clock.now(tz);
            let remaining = end.signed_duration_since(now);
            self.sleep(remaining).await?;

            let mut event = Event::new(EventKind::YearEnd, &self.spec.name);
            event.year = Some(year);
            event.year_end_delay = Some(format_delay(remaining));
            event.loc = Some(tz.name().to_string());
            self.events.emit(&event)?;
            tracing::info!(schedule = %self.spec.name, year, "year end");
        }
        Ok(())
    }

    /// Dispatch one materialised action: log it pending (or too-late),
    /// wait until it is due, run it, and record the outcome. Errors in
    /// the action itself never propagate; only cancellation and a broken
    /// event sink do.
    async fn dispatch(&self, active: &Active) -> Result<()> {
        let tz = self.place.time_zone;
        let spec = &active.spec;
        let now = self.clock.now(tz);
        let delay = active.when.signed_duration_since(now);
        let overdue = delay < -too_late_threshold();
        let id = next_invocation_id();

        let kind = if overdue {
            EventKind::TooLate
        } else {
            EventKind::Pending
        };
        let mut event = Event::new(kind, &self.spec.name);
        event.id = Some(id);
        event.device = Some(spec.device_name.clone());
        event.op = Some(spec.op.clone());
        event.args = Some(spec.args.clone());
        if let Some(pre) = &spec.precondition {
            event.pre = Some(pre.display_name());
            event.pre_args = Some(pre.args.clone());
        }
        event.dry_run = Some(self.dry_run);
        event.now = Some(Stamp::new(&now));
        event.due = Some(Stamp::new(&active.when));
        event.delay = Some(format_delay(delay));
        event.loc = Some(tz.name().to_string());
        self.events.emit(&event)?;

        if overdue {
            tracing::warn!(
                schedule = %self.spec.name,
                device = %spec.device_name,
                op = %spec.op,
                delay = %format_delay(delay),
                "too late, skipping"
            );
            return Ok(());
        }

        let record = StatusRecord {
            id,
            schedule: self.spec.name.clone(),
            device: spec.device_name.clone(),
            op: spec.op.clone(),
            op_args: spec.args.clone(),
            due: active.when,
            delay,
            precondition: spec
                .precondition
                .as_ref()
                .map(|p| (p.display_name(), p.args.clone())),
            pending: None,
            completed: None,
            precondition_result: None,
            error: None,
        };
        let handle = self.status.new_pending(record, now);

        self.sleep(delay).await?;

        let started = active.when;
        let (pre_result, outcome) = self.run_one(active).await;

        let mut event = Event::new(EventKind::Completed, &self.spec.name);
        event.id = Some(id);
        event.device = Some(spec.device_name.clone());
        event.op = Some(spec.op.clone());
        event.pre_result = pre_result;
        event.dry_run = Some(self.dry_run);
        event.started = Some(Stamp::new(&started));
        event.loc = Some(tz.name().to_string());

        match outcome {
            Ok(()) => {
                self.events.emit(&event)?;
                self.status.pending_done(handle, active.when, pre_result, None);
                tracing::debug!(schedule = %self.spec.name, op = %spec.op, "completed");
                Ok(())
            }
            Err(e) => {
                event.msg = EventKind::Failed;
                event.err = Some(e.to_string());
                self.events.emit(&event)?;
                self.status
                    .pending_done(handle, active.when, pre_result, Some(e.to_string()));
                tracing::warn!(
                    schedule = %self.spec.name,
                    op = %spec.op,
                    error = %e,
                    "failed"
                );
                if e.is_cancelled() {
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// Evaluate the precondition (if any) and invoke the operation, both
    /// under the device's timeout budget. A false precondition aborts the
    /// action without error. Never retries.
    async fn run_one(&self, active: &Active) -> (Option<bool>, Result<()>) {
        if self.dry_run {
            return (None, Ok(()));
        }
        let spec = &active.spec;
        let deadline = spec.device.timeout();

        let work = async {
            let mut pre_result = None;
            if let Some(pre) = &spec.precondition {
                let req = OpRequest::new(
                    active.when,
                    self.place.clone(),
                    pre.args.clone(),
                    self.out.clone(),
                );
                match pre.device.condition(&pre.condition, req).await {
                    Ok((_, raw)) => {
                        let ok = if pre.negated { !raw } else { raw };
                        pre_result = Some(ok);
                        if !ok {
                            return (pre_result, Ok(()));
                        }
                    }
                    Err(e) => return (pre_result, Err(Error::Device(format!("{e:#}")))),
                }
            }
            let req = OpRequest::new(
                active.when,
                self.place.clone(),
                spec.args.clone(),
                self.out.clone(),
            );
            match spec.device.operation(&spec.op, req).await {
                Ok(_) => (pre_result, Ok(())),
                Err(e) => (pre_result, Err(Error::Device(format!("{e:#}")))),
            }
        };

        tokio::select! {
            res = tokio::time::timeout(deadline, work) => match res {
                Ok(outcome) => outcome,
                Err(_) => (None, Err(Error::OpTimeout(deadline))),
            },
            _ = self.cancel.cancelled() => (None, Err(Error::Cancelled)),
        }
    }

    /// Cancellable wait. Non-positive delays return immediately.
    async fn sleep(&self, delay: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if delay <= Duration::zero() {
            return Ok(());
        }
        let std = delay.to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(std) => Ok(()),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}
