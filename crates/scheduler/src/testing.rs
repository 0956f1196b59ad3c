//! Test support: a scriptable device and shared in-memory sinks for
//! event logs and device output.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::device::{Device, OpRequest, OutputWriter};

/// What a [`TestDevice`] was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    Operation { op: String, args: Vec<String> },
    Condition { condition: String, args: Vec<String> },
}

/// A device whose operations succeed (or fail, or stall) on demand and
/// whose condition answers are scripted per name.
pub struct TestDevice {
    ops: Vec<String>,
    conditions: BTreeMap<String, bool>,
    failing: HashSet<String>,
    op_delay: Option<Duration>,
    timeout: Option<Duration>,
    invocations: Mutex<Vec<Invocation>>,
}

impl TestDevice {
    pub fn new<I, S>(ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ops: ops.into_iter().map(Into::into).collect(),
            conditions: BTreeMap::new(),
            failing: HashSet::new(),
            op_delay: None,
            timeout: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Script a condition's answer.
    pub fn with_condition(mut self, name: impl Into<String>, result: bool) -> Self {
        self.conditions.insert(name.into(), result);
        self
    }

    /// Make an operation fail with an error.
    pub fn with_failing(mut self, op: impl Into<String>) -> Self {
        self.failing.insert(op.into());
        self
    }

    /// Stall every operation, for timeout tests.
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl Device for TestDevice {
    fn operations(&self) -> Vec<String> {
        self.ops.clone()
    }

    fn conditions(&self) -> Vec<String> {
        self.conditions.keys().cloned().collect()
    }

    fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(Duration::from_secs(60))
    }

    async fn operation(&self, op: &str, req: OpRequest) -> anyhow::Result<Value> {
        self.invocations.lock().push(Invocation::Operation {
            op: op.to_string(),
            args: req.args.clone(),
        });
        if let Some(delay) = self.op_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(op) {
            anyhow::bail!("operation {op} failed");
        }
        {
            let mut out = req.out.lock();
            let _ = writeln!(out, "{op} {}", req.args.join(" "));
        }
        Ok(json!({ "op": op }))
    }

    async fn condition(&self, condition: &str, req: OpRequest) -> anyhow::Result<(Value, bool)> {
        self.invocations.lock().push(Invocation::Condition {
            condition: condition.to_string(),
            args: req.args.clone(),
        });
        match self.conditions.get(condition) {
            Some(result) => Ok((Value::Bool(*result), *result)),
            None => anyhow::bail!("condition {condition} not supported"),
        }
    }
}

/// A clonable in-memory byte sink.
#[derive(Clone, Default)]
pub struct SharedBuf {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Wrap a clone of this buffer as a device output writer.
    pub fn writer(&self) -> OutputWriter {
        Arc::new(Mutex::new(Box::new(self.clone())))
    }
}

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::discard_output;
    use chrono::TimeZone;

    fn req(args: Vec<String>) -> OpRequest {
        let due = chrono_tz::UTC.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();
        let place = hearth_datetime::Place::new(0.0, 0.0, "UTC").unwrap();
        OpRequest::new(due, place, args, discard_output())
    }

    #[tokio::test]
    async fn records_operations_and_writes_output() {
        let device = TestDevice::new(["on"]);
        let buf = SharedBuf::new();
        let mut r = req(vec!["bright".into()]);
        r.out = buf.writer();
        device.operation("on", r).await.unwrap();
        assert_eq!(
            device.invocations(),
            vec![Invocation::Operation {
                op: "on".into(),
                args: vec!["bright".into()],
            }]
        );
        assert_eq!(buf.as_string(), "on bright\n");
    }

    #[tokio::test]
    async fn failing_op_errors() {
        let device = TestDevice::new(["on"]).with_failing("on");
        assert!(device.operation("on", req(vec![])).await.is_err());
    }

    #[tokio::test]
    async fn scripted_conditions() {
        let device = TestDevice::new(["on"]).with_condition("sunny", false);
        let (_, result) = device.condition("sunny", req(vec![])).await.unwrap();
        assert!(!result);
        assert!(device.condition("rainy", req(vec![])).await.is_err());
    }
}
