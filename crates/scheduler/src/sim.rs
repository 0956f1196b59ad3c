//! The simulation driver: replay an arbitrary date range in bounded
//! wall-time by feeding pre-computed ticks to driven clocks. The runtime
//! path is exactly the production one; only the clock differs.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;

use hearth_datetime::{zoned, Place};

use crate::clock::SimClock;
use crate::error::Result;
use crate::runner::{Runner, ScheduleJob};
use crate::spec::AnnualSpec;

/// Simulation parameters. `delay` is how far before each scheduled
/// moment the driven clock reads, and therefore how long the runtime
/// really waits per action.
#[derive(Clone, Copy, Debug)]
pub struct Simulation {
    pub delay: Duration,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            delay: Duration::milliseconds(10),
        }
    }
}

impl Simulation {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    /// The tick sequence one schedule's runtime will read over
    /// `[from..to]`: one tick of `when − delay` per materialised action,
    /// plus a `year-end − delay` sentinel after each completed year.
    pub fn ticks(
        &self,
        spec: &AnnualSpec,
        place: &Place,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DateTime<Utc>> {
        let tz = place.time_zone;
        let mut out = Vec::new();

        for year in from.year()..=to.year() {
            let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) else {
                continue;
            };
            let Some(dec31) = NaiveDate::from_ymd_opt(year, 12, 31) else {
                continue;
            };
            let lo = if year == from.year() { from } else { jan1 };
            let hi = to.min(dec31);

            for day in spec.days(year, place, (lo, hi)) {
                // Days the runtime cannot materialise are skipped there
                // too, so they contribute no ticks.
                let Ok(actives) = day.active(place) else {
                    continue;
                };
                for active in actives {
                    out.push(active.when.with_timezone(&Utc) - self.delay);
                }
            }
            if hi == dec31 {
                out.push(zoned::end_of_day(tz, dec31).with_timezone(&Utc) - self.delay);
            }
        }
        out
    }

    /// Replay `[from..to]` for every schedule on `runner`, completing
    /// when all tick streams are exhausted.
    pub async fn run(
        &self,
        runner: &Runner,
        specs: Vec<Arc<AnnualSpec>>,
        from: NaiveDate,
        to: NaiveDate,
        cancel: CancellationToken,
    ) -> Result<()> {
        let place = runner.place().clone();
        let jobs = specs
            .into_iter()
            .map(|spec| {
                let ticks = self.ticks(&spec, &place, from, to);
                tracing::debug!(schedule = %spec.name, ticks = ticks.len(), "simulation ticks");
                ScheduleJob {
                    spec,
                    clock: Arc::new(SimClock::new(ticks)),
                }
            })
            .collect();
        runner.run(jobs, from, Some(to), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::Dates;
    use crate::spec::{ActionSpec, Due};
    use crate::testing::TestDevice;
    use hearth_datetime::Month;

    fn simple_spec() -> AnnualSpec {
        let device: Arc<dyn crate::device::Device> = Arc::new(TestDevice::new(["on", "off"]));
        AnnualSpec {
            name: "simple".into(),
            dates: Dates {
                months: vec![Month::new(1).unwrap()],
                ..Dates::default()
            },
            actions: vec![
                Arc::new(
                    ActionSpec::new(
                        "on",
                        Due::parse("00:00:01").unwrap(),
                        "lamp",
                        device.clone(),
                        "on",
                        vec![],
                    )
                    .unwrap(),
                ),
                Arc::new(
                    ActionSpec::new(
                        "off",
                        Due::parse("00:00:02").unwrap(),
                        "lamp",
                        device,
                        "off",
                        vec![],
                    )
                    .unwrap(),
                ),
            ],
        }
    }

    #[test]
    fn one_tick_per_action_plus_year_end() {
        let place = Place::new(51.4769, 0.0, "UTC").unwrap();
        let sim = Simulation::default();
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let ticks = sim.ticks(&simple_spec(), &place, from, to);
        // 31 days × 2 actions + 1 year-end sentinel.
        assert_eq!(ticks.len(), 31 * 2 + 1);
        assert!(ticks.windows(2).all(|w| w[0] <= w[1]), "ticks ascend");
    }

    #[test]
    fn partial_range_has_no_sentinel() {
        let place = Place::new(51.4769, 0.0, "UTC").unwrap();
        let sim = Simulation::default();
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let ticks = sim.ticks(&simple_spec(), &place, from, to);
        assert_eq!(ticks.len(), 3 * 2);
    }

    #[test]
    fn tick_precedes_due_by_delay() {
        let place = Place::new(51.4769, 0.0, "UTC").unwrap();
        let sim = Simulation::with_delay(Duration::milliseconds(5));
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let ticks = sim.ticks(&simple_spec(), &place, from, from);
        let due = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(ticks[0], due - Duration::milliseconds(5));
    }
}
