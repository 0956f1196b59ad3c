//! Replaying DST transition days through the full simulation path, in a
//! real US time zone.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tokio_util::sync::CancellationToken;

use hearth_scheduler::logfile::{self, EventKind};
use hearth_scheduler::testing::{SharedBuf, TestDevice};
use hearth_scheduler::{DeviceRegistry, EventLog, Runner, Simulation, StatusRecorder, SystemConfig};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn replay_day(yaml: &str, day: NaiveDate) -> Vec<logfile::Event> {
    let mut registry = DeviceRegistry::new();
    registry.insert("lamp", Arc::new(TestDevice::new(["on", "off"])));
    let system = SystemConfig::from_yaml(yaml)
        .unwrap()
        .compile(&registry)
        .unwrap();

    let buf = SharedBuf::new();
    let runner = Runner::new(
        system.place.clone(),
        Arc::new(StatusRecorder::new()),
        EventLog::new(Box::new(buf.clone())),
    );
    Simulation::with_delay(Duration::milliseconds(1))
        .run(&runner, system.schedules, day, day, CancellationToken::new())
        .await
        .unwrap();
    logfile::read_all(std::io::Cursor::new(buf.contents())).unwrap()
}

#[tokio::test]
async fn spring_forward_gap_actions_both_fire() {
    let yaml = r#"
place: { latitude: 34.05, longitude: -118.24, time_zone: America/Los_Angeles }
schedules:
  - name: gap
    device: lamp
    dates: { months: mar }
    actions:
      on: 02:00
      off: 03:00
"#;
    let events = replay_day(yaml, date(2024, 3, 10)).await;
    let summary = &logfile::summarize(&events)["gap"];
    assert_eq!(summary.pending, 2, "the 02:00 action is not lost in the gap");
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.too_late, 0);

    // Both fire at the shifted instant, 03:00 PDT.
    let dues: Vec<String> = events
        .iter()
        .filter(|e| e.msg == EventKind::Pending)
        .map(|e| e.due.as_ref().unwrap().to_string())
        .collect();
    assert_eq!(dues.len(), 2);
    assert!(dues.iter().all(|d| d.contains("03:00:00") && d.ends_with("PDT")));
}

#[tokio::test]
async fn hourly_repeat_across_fall_back_fires_24_times() {
    let yaml = r#"
place: { latitude: 34.05, longitude: -118.24, time_zone: America/Los_Angeles }
schedules:
  - name: fold
    device: lamp
    dates: { months: nov }
    actions_detailed:
      - action: off
        when: 01:00
        repeat: 1h
"#;
    let events = replay_day(yaml, date(2024, 11, 3)).await;
    let summary = &logfile::summarize(&events)["fold"];
    assert_eq!(summary.pending, 24);
    assert_eq!(summary.completed, 24);

    // The duplicated 1am hour appears in both offsets.
    let dues: Vec<String> = events
        .iter()
        .filter(|e| e.msg == EventKind::Pending)
        .map(|e| e.due.as_ref().unwrap().to_string())
        .collect();
    assert!(dues[0].ends_with("PDT"));
    assert!(dues[1].ends_with("PST"));
    assert!(dues[0].contains("T01:00:00") && dues[1].contains("T01:00:00"));
}

#[tokio::test]
async fn hourly_repeat_across_spring_forward_fires_23_times() {
    let yaml = r#"
place: { latitude: 34.05, longitude: -118.24, time_zone: America/Los_Angeles }
schedules:
  - name: gap
    device: lamp
    dates: { months: mar }
    actions_detailed:
      - action: off
        when: 01:00
        repeat: 1h
"#;
    let events = replay_day(yaml, date(2024, 3, 10)).await;
    let summary = &logfile::summarize(&events)["gap"];
    assert_eq!(summary.pending, 23);
    assert_eq!(summary.completed, 23);
}
