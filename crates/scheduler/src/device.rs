//! The device seam: named operations and conditions behind a registry,
//! resolved once at schedule construction.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use hearth_datetime::Place;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Shared sink for device chatter during an invocation.
pub type OutputWriter = Arc<Mutex<Box<dyn io::Write + Send>>>;

/// Everything an operation or condition receives when invoked.
#[derive(Clone)]
pub struct OpRequest {
    /// The instant the action was due.
    pub due: DateTime<Tz>,
    pub place: Place,
    pub args: Vec<String>,
    pub out: OutputWriter,
}

impl OpRequest {
    pub fn new(due: DateTime<Tz>, place: Place, args: Vec<String>, out: OutputWriter) -> Self {
        Self {
            due,
            place,
            args,
            out,
        }
    }
}

/// A sink that discards device output.
pub fn discard_output() -> OutputWriter {
    Arc::new(Mutex::new(Box::new(io::sink())))
}

/// A controllable device. Operations do things; conditions answer yes/no
/// questions (plus an opaque detail value). Both sets are fixed for the
/// lifetime of the device so schedules can be validated up front.
#[async_trait]
pub trait Device: Send + Sync {
    /// Names of the operations this device accepts.
    fn operations(&self) -> Vec<String>;

    /// Names of the conditions this device can evaluate.
    fn conditions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Budget for a single operation or condition invocation.
    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn operation(&self, op: &str, req: OpRequest) -> anyhow::Result<Value>;

    async fn condition(&self, condition: &str, req: OpRequest) -> anyhow::Result<(Value, bool)> {
        let _ = req;
        anyhow::bail!("condition {condition} not supported")
    }
}

/// Wraps a device with a different invocation timeout (configuration
/// override).
pub struct TimeoutOverride {
    inner: Arc<dyn Device>,
    timeout: Duration,
}

impl TimeoutOverride {
    pub fn new(inner: Arc<dyn Device>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Device for TimeoutOverride {
    fn operations(&self) -> Vec<String> {
        self.inner.operations()
    }

    fn conditions(&self) -> Vec<String> {
        self.inner.conditions()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn operation(&self, op: &str, req: OpRequest) -> anyhow::Result<Value> {
        self.inner.operation(op, req).await
    }

    async fn condition(&self, condition: &str, req: OpRequest) -> anyhow::Result<(Value, bool)> {
        self.inner.condition(condition, req).await
    }
}

/// Name → device mapping, immutable after construction.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, Arc<dyn Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, device: Arc<dyn Device>) {
        self.devices.insert(name.into(), device);
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Device>> {
        self.devices
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Replace `name`'s entry with a timeout-overridden wrapper.
    pub fn override_timeout(&mut self, name: &str, timeout: Duration) -> Result<()> {
        let device = self.lookup(name)?;
        self.devices.insert(
            name.to_string(),
            Arc::new(TimeoutOverride::new(device, timeout)),
        );
        Ok(())
    }
}
