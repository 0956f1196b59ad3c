//! Thread-safe record of pending and completed action invocations,
//! consumed concurrently by UIs and summaries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use parking_lot::Mutex;

/// Process-wide invocation id counter.
static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_invocation_id() -> u64 {
    NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Derived state of one recorded invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pending,
    Completed,
    /// Precondition evaluated to false; the operation never ran.
    Aborted,
    Failed,
}

/// One action invocation, from pending through completion.
#[derive(Clone, Debug)]
pub struct StatusRecord {
    pub id: u64,
    pub schedule: String,
    pub device: String,
    pub op: String,
    pub op_args: Vec<String>,
    pub due: DateTime<Tz>,
    pub delay: Duration,
    /// Precondition name and args, when the action carries one.
    pub precondition: Option<(String, Vec<String>)>,
    pub pending: Option<DateTime<Tz>>,
    pub completed: Option<DateTime<Tz>>,
    pub precondition_result: Option<bool>,
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn status(&self) -> Status {
        if self.completed.is_none() {
            return Status::Pending;
        }
        if self.error.is_some() {
            return Status::Failed;
        }
        if self.precondition_result == Some(false) {
            return Status::Aborted;
        }
        Status::Completed
    }
}

/// Handle returned by [`StatusRecorder::new_pending`]; spends O(1) to
/// move the record to the completed list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingHandle(u64);

#[derive(Default)]
struct Inner {
    // Keyed by invocation id: ids are monotonic, so iteration order is
    // insertion order.
    pending: BTreeMap<u64, StatusRecord>,
    completed: Vec<StatusRecord>,
}

/// The sole mutable cross-task state of the scheduler. One mutex guards
/// both lists; readers take snapshots.
#[derive(Default)]
pub struct StatusRecorder {
    inner: Mutex<Inner>,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending record, stamping the pending instant.
    pub fn new_pending(&self, mut record: StatusRecord, now: DateTime<Tz>) -> PendingHandle {
        record.pending = Some(now);
        let handle = PendingHandle(record.id);
        self.inner.lock().pending.insert(record.id, record);
        handle
    }

    /// Move a pending record to the completed list, stamping its outcome.
    pub fn pending_done(
        &self,
        handle: PendingHandle,
        completed_at: DateTime<Tz>,
        precondition_result: Option<bool>,
        error: Option<String>,
    ) {
        let mut inner = self.inner.lock();
        if let Some(mut record) = inner.pending.remove(&handle.0) {
            record.completed = Some(completed_at);
            record.precondition_result = precondition_result;
            record.error = error;
            inner.completed.push(record);
        }
    }

    /// Snapshot of pending records in insertion order.
    pub fn pending(&self) -> Vec<StatusRecord> {
        self.inner.lock().pending.values().cloned().collect()
    }

    /// Snapshot of completed records in completion order.
    pub fn completed(&self) -> Vec<StatusRecord> {
        self.inner.lock().completed.clone()
    }

    /// Drop completed history.
    pub fn reset_completed(&self) {
        self.inner.lock().completed.clear();
    }
}
