//! YAML schedule configuration: serde binding structs plus compilation
//! into validated annual specs against the device registry.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use hearth_datetime::{Date, DateRange, DynamicDateRange, Month, Place};

use crate::dates::{Constraints, Dates};
use crate::device::DeviceRegistry;
use crate::error::{Error, Result};
use crate::spec::{ActionSpec, AnnualSpec, Due, OrderHint, Precondition, RepeatSpec};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Binding structs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub place: PlaceConfig,
    /// Per-device invocation timeout overrides, e.g. `"30s"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub device_timeouts: BTreeMap<String, String>,
    pub schedules: Vec<ScheduleConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub time_zone: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatesConfig {
    /// Comma-separated month list, e.g. `"jan,feb"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub months: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mirror_months: bool,
    /// Literal ranges (`"02/01:02/10"`) or dynamic tags (`"summer"`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub weekdays: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub weekends: bool,
    /// Comma-separated exclusions, e.g. `"jan-02,feb-02"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exclude_dates: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub name: String,
    /// Device for the plain `actions` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default)]
    pub dates: DatesConfig,
    /// Operation name → due-time string (comma lists expand).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions_detailed: Vec<DetailedActionConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedActionConfig {
    /// Operation to invoke; also the action's name unless `name` is set.
    pub action: String,
    pub when: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Repeat interval, e.g. `"30m"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
    /// Total occurrences including the first; 0 fills the day.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub num_repeats: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<PreconditionConfig>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreconditionConfig {
    pub device: String,
    /// Condition name; a leading `!` negates the result.
    pub op: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Loading & compilation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A loaded configuration compiled against a device registry.
pub struct CompiledSystem {
    pub place: Place,
    pub schedules: Vec<Arc<AnnualSpec>>,
}

impl SystemConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Wrap registry entries whose timeout this config overrides.
    pub fn apply_device_timeouts(&self, registry: &mut DeviceRegistry) -> Result<()> {
        for (device, timeout) in &self.device_timeouts {
            let parsed = humantime::parse_duration(timeout)
                .map_err(|_| Error::InvalidDuration(timeout.clone()))?;
            registry.override_timeout(device, parsed)?;
        }
        Ok(())
    }

    /// Validate and compile every schedule against `registry`.
    pub fn compile(&self, registry: &DeviceRegistry) -> Result<CompiledSystem> {
        let place = Place::new(
            self.place.latitude,
            self.place.longitude,
            &self.place.time_zone,
        )?;

        let mut seen: HashSet<&str> = HashSet::new();
        let mut schedules = Vec::with_capacity(self.schedules.len());
        for schedule in &self.schedules {
            if !seen.insert(schedule.name.as_str()) {
                return Err(Error::DuplicateSchedule(schedule.name.clone()));
            }
            schedules.push(Arc::new(compile_schedule(schedule, registry)?));
        }
        Ok(CompiledSystem { place, schedules })
    }
}

fn compile_schedule(config: &ScheduleConfig, registry: &DeviceRegistry) -> Result<AnnualSpec> {
    let dates = compile_dates(&config.dates)?;
    let mut actions: Vec<Arc<ActionSpec>> = Vec::new();

    for (op, when) in &config.actions {
        let device_name =
            config
                .device
                .as_deref()
                .ok_or_else(|| Error::MissingDevice {
                    schedule: config.name.clone(),
                    action: op.clone(),
                })?;
        let device = registry.lookup(device_name)?;
        for (i, due) in Due::parse_list(when)?.into_iter().enumerate() {
            let name = action_instance_name(op, i);
            actions.push(Arc::new(ActionSpec::new(
                &name,
                due,
                device_name,
                device.clone(),
                op,
                vec![],
            )?));
        }
    }

    for detailed in &config.actions_detailed {
        let base_name = detailed.name.as_deref().unwrap_or(&detailed.action);
        let device_name = detailed
            .device
            .as_deref()
            .or(config.device.as_deref())
            .ok_or_else(|| Error::MissingDevice {
                schedule: config.name.clone(),
                action: base_name.to_string(),
            })?;
        let device = registry.lookup(device_name)?;

        let order = match (&detailed.before, &detailed.after) {
            (Some(_), Some(_)) => {
                return Err(Error::OrderBothSet {
                    action: base_name.to_string(),
                })
            }
            (Some(before), None) => Some(OrderHint::Before(before.clone())),
            (None, Some(after)) => Some(OrderHint::After(after.clone())),
            (None, None) => None,
        };

        let repeat = detailed
            .repeat
            .as_deref()
            .map(|interval| -> Result<RepeatSpec> {
                let std = humantime::parse_duration(interval)
                    .map_err(|_| Error::InvalidDuration(interval.to_string()))?;
                let interval = Duration::from_std(std)
                    .map_err(|_| Error::InvalidDuration(interval.to_string()))?;
                RepeatSpec::new(interval, detailed.num_repeats)
            })
            .transpose()?;

        let precondition = detailed
            .precondition
            .as_ref()
            .map(|pre| -> Result<Precondition> {
                let pre_device = registry.lookup(&pre.device)?;
                Precondition::new(&pre.device, pre_device, &pre.op, pre.args.clone())
            })
            .transpose()?;

        for (i, due) in Due::parse_list(&detailed.when)?.into_iter().enumerate() {
            let name = action_instance_name(base_name, i);
            let mut spec = ActionSpec::new(
                &name,
                due,
                device_name,
                device.clone(),
                &detailed.action,
                detailed.args.clone(),
            )?;
            spec.repeat = repeat;
            spec.precondition = precondition.clone();
            spec.order = order.clone();
            actions.push(Arc::new(spec));
        }
    }

    let spec = AnnualSpec {
        name: config.name.clone(),
        dates,
        actions,
    };
    spec.validate_ordering()?;
    Ok(spec)
}

fn action_instance_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}#{}", index + 1)
    }
}

fn compile_dates(config: &DatesConfig) -> Result<Dates> {
    let months = if config.months.is_empty() {
        Vec::new()
    } else {
        Month::parse_list(&config.months)?
    };

    let mut ranges: Vec<DateRange> = Vec::new();
    let mut dynamic: Vec<DynamicDateRange> = Vec::new();
    for entry in &config.ranges {
        if entry.contains(':') {
            ranges.push(entry.parse()?);
        } else {
            dynamic.push(entry.parse()?);
        }
    }

    let exclude = if config.exclude_dates.is_empty() {
        Vec::new()
    } else {
        Date::parse_list(&config.exclude_dates)?
    };

    Ok(Dates {
        months,
        mirror_months: config.mirror_months,
        ranges,
        dynamic,
        constraints: Constraints::new(config.weekdays, config.weekends, exclude)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestDevice;

    const SAMPLE: &str = r#"
place:
  latitude: 37.7749
  longitude: -122.4194
  time_zone: America/Los_Angeles
device_timeouts:
  lamp: 30s
schedules:
  - name: simple
    device: lamp
    dates:
      months: jan,feb
      exclude_dates: jan-02,feb-02
    actions:
      on: 00:00:01
      off: 00:00:02
  - name: garden
    device: lamp
    dates:
      ranges:
        - summer
        - 02/01:02/10
      weekdays: true
    actions_detailed:
      - action: on
        when: sunset-30m
        precondition:
          device: weather
          op: "!raining"
      - action: off
        when: 23:00
        repeat: 30m
        num_repeats: 4
"#;

    fn registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.insert("lamp", Arc::new(TestDevice::new(["on", "off"])));
        registry.insert(
            "weather",
            Arc::new(TestDevice::new(["report"]).with_condition("raining", false)),
        );
        registry
    }

    #[test]
    fn sample_parses_and_compiles() {
        let config = SystemConfig::from_yaml(SAMPLE).unwrap();
        let system = config.compile(&registry()).unwrap();
        assert_eq!(system.place.time_zone.name(), "America/Los_Angeles");
        assert_eq!(system.schedules.len(), 2);

        let simple = &system.schedules[0];
        assert_eq!(simple.name, "simple");
        assert_eq!(simple.actions.len(), 2);
        assert_eq!(simple.dates.months.len(), 2);
        assert_eq!(simple.dates.constraints.exclude.len(), 2);

        let garden = &system.schedules[1];
        assert_eq!(garden.dates.ranges.len(), 1);
        assert_eq!(garden.dates.dynamic, vec![DynamicDateRange::Summer]);
        assert!(garden.dates.constraints.weekdays_only);
        let on = &garden.actions[0];
        assert!(on.precondition.as_ref().unwrap().negated);
        let off = &garden.actions[1];
        assert_eq!(off.repeat.unwrap().count, 4);
    }

    #[test]
    fn yaml_round_trip_is_equivalent() {
        let config = SystemConfig::from_yaml(SAMPLE).unwrap();
        let emitted = config.to_yaml().unwrap();
        let reparsed = SystemConfig::from_yaml(&emitted).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn duplicate_schedule_names_rejected() {
        let mut config = SystemConfig::from_yaml(SAMPLE).unwrap();
        let mut dup = config.schedules[0].clone();
        dup.actions.clear();
        config.schedules.push(dup);
        assert!(matches!(
            config.compile(&registry()),
            Err(Error::DuplicateSchedule(_))
        ));
    }

    #[test]
    fn unknown_device_rejected() {
        let mut config = SystemConfig::from_yaml(SAMPLE).unwrap();
        config.schedules[0].device = Some("toaster".into());
        assert!(matches!(
            config.compile(&registry()),
            Err(Error::UnknownDevice(_))
        ));
    }

    #[test]
    fn unknown_operation_rejected() {
        let mut config = SystemConfig::from_yaml(SAMPLE).unwrap();
        config.schedules[0]
            .actions
            .insert("explode".into(), "01:00".into());
        assert!(matches!(
            config.compile(&registry()),
            Err(Error::UnknownOperation { .. })
        ));
    }

    #[test]
    fn missing_device_rejected() {
        let mut config = SystemConfig::from_yaml(SAMPLE).unwrap();
        config.schedules[0].device = None;
        assert!(matches!(
            config.compile(&registry()),
            Err(Error::MissingDevice { .. })
        ));
    }

    #[test]
    fn both_before_and_after_rejected() {
        let mut config = SystemConfig::from_yaml(SAMPLE).unwrap();
        let detailed = &mut config.schedules[1].actions_detailed[0];
        detailed.before = Some("off".into());
        detailed.after = Some("off".into());
        assert!(matches!(
            config.compile(&registry()),
            Err(Error::OrderBothSet { .. })
        ));
    }

    #[test]
    fn comma_separated_when_expands() {
        let yaml = r#"
place: { latitude: 0.0, longitude: 0.0, time_zone: UTC }
schedules:
  - name: multi
    device: lamp
    actions:
      on: "06:00,18:00"
"#;
        let system = SystemConfig::from_yaml(yaml)
            .unwrap()
            .compile(&registry())
            .unwrap();
        let actions = &system.schedules[0].actions;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].name, "on");
        assert_eq!(actions[1].name, "on#2");
        assert_eq!(actions[0].op, "on");
        assert_eq!(actions[1].op, "on");
    }

    #[test]
    fn weekdays_and_weekends_exclusive() {
        let mut config = SystemConfig::from_yaml(SAMPLE).unwrap();
        config.schedules[1].dates.weekends = true;
        assert!(matches!(
            config.compile(&registry()),
            Err(Error::ExclusiveConstraints)
        ));
    }

    #[test]
    fn timeout_overrides_apply() {
        let config = SystemConfig::from_yaml(SAMPLE).unwrap();
        let mut registry = registry();
        config.apply_device_timeouts(&mut registry).unwrap();
        assert_eq!(
            registry.lookup("lamp").unwrap().timeout(),
            std::time::Duration::from_secs(30)
        );
    }

    #[test]
    fn bad_repeat_interval_rejected() {
        let yaml = r#"
place: { latitude: 0.0, longitude: 0.0, time_zone: UTC }
schedules:
  - name: s
    device: lamp
    actions_detailed:
      - action: on
        when: 06:00
        repeat: soon
"#;
        let config = SystemConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.compile(&registry()),
            Err(Error::InvalidDuration(_))
        ));
    }
}
