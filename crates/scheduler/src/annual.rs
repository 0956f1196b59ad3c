//! The annual scheduling engine: materialising a schedule's annual
//! specification into dated, timed, ordered actions, day by day, with
//! repeats expanded and DST transitions resolved.

use std::sync::Arc;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone};
use chrono_tz::Tz;
use hearth_datetime::{zoned, Place};

use crate::error::Result;
use crate::order;
use crate::spec::{ActionSpec, AnnualSpec, RepeatSpec};

/// One qualifying day of a schedule, with the actions that apply to it.
/// A day with no resolvable actions still appears (a heartbeat for
/// consumers).
#[derive(Clone, Debug)]
pub struct Scheduled {
    pub date: NaiveDate,
    pub specs: Vec<Arc<ActionSpec>>,
}

/// A fully materialised occurrence of one action at an absolute instant.
#[derive(Clone, Debug)]
pub struct Active {
    pub when: DateTime<Tz>,
    pub spec: Arc<ActionSpec>,
}

impl AnnualSpec {
    /// The schedule's qualifying days for `year`, ascending, clipped to
    /// the inclusive `bound`.
    pub fn days(&self, year: i32, place: &Place, bound: (NaiveDate, NaiveDate)) -> Vec<Scheduled> {
        self.dates
            .active_days(year, place, bound)
            .into_iter()
            .map(|date| Scheduled {
                date,
                specs: self.actions.clone(),
            })
            .collect()
    }
}

impl Scheduled {
    /// Materialise this day's actions in firing order: resolve due times,
    /// enforce co-scheduling adjacency, expand repeats, and sort by
    /// instant (stable, so within-group order is preserved).
    ///
    /// Actions whose dynamic time does not occur today (polar latitudes)
    /// are skipped with a warning.
    pub fn active(&self, place: &Place) -> Result<Vec<Active>> {
        let tz = place.time_zone;
        let mut base: Vec<order::DueEntry> = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let Some(tod) = spec.due.resolve(self.date, place) else {
                tracing::warn!(
                    action = %spec.name,
                    date = %self.date,
                    "dynamic time has no occurrence today, skipping"
                );
                continue;
            };
            base.push((spec.clone(), zoned::resolve(tz, self.date, tod)));
        }

        base.sort_by(|a, b| a.1.cmp(&b.1));
        order::apply(&mut base)?;

        let mut out = Vec::new();
        for (spec, when) in base {
            match &spec.repeat {
                None => out.push(Active {
                    when,
                    spec: spec.clone(),
                }),
                Some(repeat) => {
                    for occurrence in expand_repeats(tz, self.date, when, repeat) {
                        out.push(Active {
                            when: occurrence,
                            spec: spec.clone(),
                        });
                    }
                }
            }
        }

        out.sort_by(|a, b| a.when.cmp(&b.when));
        Ok(out)
    }
}

/// Expand a repeating action's occurrences within one calendar day.
///
/// Intervals of at most one hour advance by real time, so the spacing
/// between occurrences is preserved across DST transitions: a fall-back
/// day traverses the duplicated hour, and a wall tick that lands in the
/// spring-forward gap survives at the first valid instant after it.
/// Longer intervals advance in wall-clock space and absorb the jump.
fn expand_repeats(
    tz: Tz,
    date: NaiveDate,
    first: DateTime<Tz>,
    repeat: &RepeatSpec,
) -> Vec<DateTime<Tz>> {
    let cap = repeat.count;
    let mut out = vec![first];

    if repeat.interval <= Duration::hours(1) {
        let mut current = first;
        let mut wall = first.naive_local();
        loop {
            if cap != 0 && out.len() >= cap {
                break;
            }
            let next = current + repeat.interval;
            if next.date_naive() != date {
                break;
            }
            let expected = wall + repeat.interval;
            if next.naive_local() != expected
                && matches!(tz.from_local_datetime(&expected), LocalResult::None)
            {
                // The expected wall tick fell in the skipped hour; it
                // fires at the transition instant, before the real-time
                // successor.
                out.push(zoned::resolve_naive(tz, expected));
                if cap != 0 && out.len() >= cap {
                    break;
                }
            }
            out.push(next);
            wall = next.naive_local();
            current = next;
        }
    } else {
        let mut wall = first.naive_local();
        loop {
            if cap != 0 && out.len() >= cap {
                break;
            }
            let next_wall = wall + repeat.interval;
            if next_wall.date() != date {
                break;
            }
            out.push(zoned::resolve_naive(tz, next_wall));
            wall = next_wall;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::Dates;
    use crate::spec::{Due, OrderHint};
    use crate::testing::TestDevice;
    use chrono::{Offset, Timelike};
    use hearth_datetime::{Month, TimeOfDay};

    fn la_place() -> Place {
        Place::new(34.05, -118.24, "America/Los_Angeles").unwrap()
    }

    fn utc_place() -> Place {
        Place::new(51.4769, 0.0, "UTC").unwrap()
    }

    fn device() -> Arc<dyn crate::device::Device> {
        Arc::new(TestDevice::new(["on", "off", "another"]))
    }

    fn action(name: &str, due: &str) -> Arc<ActionSpec> {
        Arc::new(
            ActionSpec::new(name, Due::parse(due).unwrap(), "lamp", device(), "on", vec![])
                .unwrap(),
        )
    }

    fn repeating(name: &str, due: &str, interval: Duration, count: usize) -> Arc<ActionSpec> {
        Arc::new(
            ActionSpec::new(name, Due::parse(due).unwrap(), "lamp", device(), "on", vec![])
                .unwrap()
                .with_repeat(RepeatSpec::new(interval, count).unwrap()),
        )
    }

    fn day(date: (i32, u32, u32), specs: Vec<Arc<ActionSpec>>) -> Scheduled {
        Scheduled {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            specs,
        }
    }

    #[test]
    fn actions_ordered_by_resolved_instant() {
        let scheduled = day(
            (2025, 1, 15),
            vec![action("late", "18:00"), action("early", "06:00")],
        );
        let actives = scheduled.active(&utc_place()).unwrap();
        assert_eq!(actives.len(), 2);
        assert_eq!(actives[0].spec.name, "early");
        assert_eq!(actives[1].spec.name, "late");
    }

    #[test]
    fn co_scheduled_ordering_applied() {
        let mut another = (*action("another", "12:00")).clone();
        another.order = Some(OrderHint::Before("on".into()));
        let scheduled = day(
            (2025, 1, 15),
            vec![
                action("on", "12:00"),
                action("off", "12:00"),
                Arc::new(another),
            ],
        );
        let names: Vec<String> = scheduled
            .active(&utc_place())
            .unwrap()
            .iter()
            .map(|a| a.spec.name.clone())
            .collect();
        assert_eq!(names, ["another", "on", "off"]);
    }

    #[test]
    fn repeat_with_cap_yields_exact_count() {
        let scheduled = day(
            (2025, 1, 15),
            vec![repeating("drip", "01:00", Duration::minutes(30), 4)],
        );
        let times: Vec<String> = scheduled
            .active(&utc_place())
            .unwrap()
            .iter()
            .map(|a| a.when.time().to_string())
            .collect();
        assert_eq!(times, ["01:00:00", "01:30:00", "02:00:00", "02:30:00"]);
    }

    #[test]
    fn unbounded_repeat_fills_the_day() {
        let scheduled = day(
            (2025, 1, 15),
            vec![repeating("hourly", "01:00", Duration::hours(1), 0)],
        );
        let actives = scheduled.active(&utc_place()).unwrap();
        // 01:00 through 23:00.
        assert_eq!(actives.len(), 23);
        assert_eq!(actives.last().unwrap().when.hour(), 23);
    }

    #[test]
    fn repeat_occurrence_count_formula() {
        // floor((end_of_day - due) / interval) + 1 on a plain day.
        let due = TimeOfDay::new(6, 30, 0).unwrap();
        let interval = Duration::minutes(45);
        let scheduled = day(
            (2025, 3, 3),
            vec![repeating("t", "06:30", interval, 0)],
        );
        let actives = scheduled.active(&utc_place()).unwrap();
        let day_left = Duration::hours(24)
            - Duration::hours(due.hour() as i64)
            - Duration::minutes(due.minute() as i64);
        let expected = (day_left.num_seconds() - 1) / interval.num_seconds() + 1;
        assert_eq!(actives.len() as i64, expected);
    }

    // ── DST: spring forward (2024-03-10, America/Los_Angeles) ────────

    #[test]
    fn literal_in_gap_fires_at_transition() {
        let scheduled = day(
            (2024, 3, 10),
            vec![action("on", "02:00"), action("off", "03:00")],
        );
        let actives = scheduled.active(&la_place()).unwrap();
        assert_eq!(actives.len(), 2, "both the 02:00 and 03:00 actions fire");
        assert_eq!(actives[0].when, actives[1].when, "at the same instant");
        assert_eq!(actives[0].spec.name, "on", "declaration order preserved");
    }

    #[test]
    fn hourly_repeat_spring_forward_fires_23_times() {
        let scheduled = day(
            (2024, 3, 10),
            vec![repeating("off", "01:00", Duration::hours(1), 0)],
        );
        let actives = scheduled.active(&la_place()).unwrap();
        assert_eq!(actives.len(), 23);
        // The 02:00 wall tick survives at 03:00, alongside the 03:00 tick.
        assert_eq!(actives[1].when, actives[2].when);
        assert_eq!(actives[1].when.hour(), 3);
        assert_eq!(actives.last().unwrap().when.hour(), 23);
    }

    #[test]
    fn long_interval_absorbs_spring_jump() {
        let scheduled = day(
            (2024, 3, 10),
            vec![repeating("t", "00:30", Duration::hours(4), 0)],
        );
        let times: Vec<u32> = scheduled
            .active(&la_place())
            .unwrap()
            .iter()
            .map(|a| a.when.hour())
            .collect();
        // Wall-clock alignment preserved: 00:30, 04:30, … 20:30.
        assert_eq!(times, [0, 4, 8, 12, 16, 20]);
    }

    // ── DST: fall back (2024-11-03, America/Los_Angeles) ─────────────

    #[test]
    fn hourly_repeat_fall_back_fires_24_times() {
        let scheduled = day(
            (2024, 11, 3),
            vec![repeating("off", "01:00", Duration::hours(1), 0)],
        );
        let actives = scheduled.active(&la_place()).unwrap();
        assert_eq!(actives.len(), 24);
        // The 1am hour is traversed twice in real time.
        assert_eq!(actives[0].when.hour(), 1);
        assert_eq!(actives[1].when.hour(), 1);
        assert_ne!(actives[0].when, actives[1].when);
        assert_eq!(
            actives[1].when - actives[0].when,
            Duration::hours(1),
            "real-time interval preserved across the fold"
        );
    }

    #[test]
    fn thirteen_minute_repeat_covers_duplicated_hour() {
        let scheduled = day(
            (2024, 11, 3),
            vec![repeating("t", "01:13", Duration::minutes(13), 0)],
        );
        let actives = scheduled.active(&la_place()).unwrap();
        // The day is 25 real hours starting 01:13 PDT: 23h47m of 13-minute
        // steps is 110 occurrences.
        assert_eq!(actives.len(), 110);
        // The second pass of the 1am hour (now PST) carries 5 extra
        // occurrences: 01:05, 01:18, 01:31, 01:44, 01:57.
        let pst = chrono::FixedOffset::west_opt(8 * 3600).unwrap();
        let second_pass = actives
            .iter()
            .filter(|a| a.when.hour() == 1 && a.when.offset().fix() == pst)
            .count();
        assert_eq!(second_pass, 5);
    }

    #[test]
    fn fall_back_literal_fires_once() {
        let scheduled = day((2024, 11, 3), vec![action("on", "01:30")]);
        let actives = scheduled.active(&la_place()).unwrap();
        assert_eq!(actives.len(), 1, "no duplicate firing in the folded hour");
    }

    // ── Day set plumbing ─────────────────────────────────────────────

    #[test]
    fn days_share_the_action_list() {
        let spec = AnnualSpec {
            name: "s".into(),
            dates: Dates {
                months: vec![Month::new(1).unwrap()],
                ..Dates::default()
            },
            actions: vec![action("on", "08:00")],
        };
        let bound = (
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        );
        let days = spec.days(2025, &utc_place(), bound);
        assert_eq!(days.len(), 31);
        assert!(days.iter().all(|d| d.specs.len() == 1));
        assert_eq!(days[0].date, bound.0);
    }

    #[test]
    fn polar_dynamic_time_skipped_with_heartbeat() {
        let svalbard = Place::new(78.22, 15.64, "Arctic/Longyearbyen").unwrap();
        let spec = Arc::new(
            ActionSpec::new(
                "dawn",
                Due::parse("sunrise").unwrap(),
                "lamp",
                device(),
                "on",
                vec![],
            )
            .unwrap(),
        );
        let scheduled = day((2024, 12, 21), vec![spec]);
        let actives = scheduled.active(&svalbard).unwrap();
        assert!(actives.is_empty(), "no sunrise in polar night");
    }

    #[test]
    fn dynamic_offset_can_reorder_before_literal_peer() {
        // sunset-13h resolves to early morning at Greenwich in June,
        // well before the 12:00 literal peer: final order is by instant.
        let scheduled = day(
            (2024, 6, 15),
            vec![action("noon", "12:00"), action("dusk", "sunset-13h")],
        );
        let actives = scheduled.active(&utc_place()).unwrap();
        assert_eq!(actives[0].spec.name, "dusk");
        assert_eq!(actives[1].spec.name, "noon");
    }
}
