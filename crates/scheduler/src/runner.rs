//! Runs every schedule's runtime in parallel: fail-fast on the first
//! fatal error, clean drain on user cancellation.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use hearth_datetime::Place;

use crate::clock::{Clock, SystemClock};
use crate::device::{discard_output, OutputWriter};
use crate::error::{Error, Result};
use crate::logfile::EventLog;
use crate::runtime::ScheduleRuntime;
use crate::spec::AnnualSpec;
use crate::status::StatusRecorder;

/// One schedule plus the clock its runtime reads. Production uses the
/// system clock everywhere; simulation assigns one driven clock per
/// schedule.
pub struct ScheduleJob {
    pub spec: Arc<AnnualSpec>,
    pub clock: Arc<dyn Clock>,
}

impl ScheduleJob {
    pub fn live(spec: Arc<AnnualSpec>) -> Self {
        Self {
            spec,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Shared wiring for a fleet of schedule runtimes.
pub struct Runner {
    place: Place,
    status: Arc<StatusRecorder>,
    events: EventLog,
    out: OutputWriter,
    dry_run: bool,
}

impl Runner {
    pub fn new(place: Place, status: Arc<StatusRecorder>, events: EventLog) -> Self {
        Self {
            place,
            status,
            events,
            out: discard_output(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_output(mut self, out: OutputWriter) -> Self {
        self.out = out;
        self
    }

    pub fn place(&self) -> &Place {
        &self.place
    }

    /// Launch one runtime per job and wait for all of them.
    ///
    /// The first non-cancellation error cancels the remaining runtimes,
    /// drains them, and is returned. Cancelling `cancel` stops everything
    /// cleanly: children drain and the run returns `Ok`.
    pub async fn run(
        &self,
        jobs: Vec<ScheduleJob>,
        start: NaiveDate,
        until: Option<NaiveDate>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let fan_out = cancel.child_token();
        let mut set: JoinSet<Result<()>> = JoinSet::new();

        for job in jobs {
            let runtime = ScheduleRuntime::new(
                job.spec,
                self.place.clone(),
                job.clock,
                self.status.clone(),
                self.events.clone(),
            )
            .with_dry_run(self.dry_run)
            .with_output(self.out.clone())
            .with_cancel(fan_out.clone());
            set.spawn(async move { runtime.run(start, until).await });
        }

        let mut first_error: Option<Error> = None;
        while let Some(joined) = set.join_next().await {
            let failed = match joined {
                Ok(Ok(())) => None,
                Ok(Err(e)) if e.is_cancelled() => None,
                Ok(Err(e)) => Some(e),
                Err(join_error) => Some(Error::Task(join_error.to_string())),
            };
            if let Some(e) = failed {
                if first_error.is_none() {
                    tracing::error!(error = %e, "schedule failed, stopping runner");
                    fan_out.cancel();
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Production entry point: all schedules on the system clock,
    /// indefinitely.
    pub async fn run_live(
        &self,
        specs: Vec<Arc<AnnualSpec>>,
        start: NaiveDate,
        cancel: CancellationToken,
    ) -> Result<()> {
        let jobs = specs.into_iter().map(ScheduleJob::live).collect();
        self.run(jobs, start, None, cancel).await
    }
}
