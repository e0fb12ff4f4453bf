//! Failure injection: stop and restart cluster instances on a random schedule.
//!
//! [`FailureInjector`] performs a single stop/start cycle against one randomly
//! chosen running instance. [`FailureScheduler`] drives the injector from a
//! background task, sleeping a random interval between cycles.

mod injector;
mod scheduler;

pub use injector::{FailureInjector, InjectError};
pub use scheduler::FailureScheduler;

use chaos_cluster::InstanceId;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Events kept in memory per scheduler.
pub const HISTORY_CAPACITY: usize = 1024;

/// Last step an injection reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    /// Stopping the instance.
    Stop,
    /// Restarting the instance.
    Start,
}

/// Result of the last step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureOutcome {
    /// Step succeeded.
    Success,
    /// Step failed with the given cluster error.
    Error(String),
}

impl FailureOutcome {
    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, FailureOutcome::Success)
    }
}

/// One stop/start cycle against one instance.
///
/// A fully successful cycle is recorded as action `Start`, outcome `Success`.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvent {
    /// Instance that was stopped.
    pub instance: InstanceId,
    /// Last step attempted.
    pub action: FailureAction,
    /// Outcome of that step.
    pub outcome: FailureOutcome,
    /// Wall-clock time the stop was issued.
    pub timestamp: SystemTime,
    /// Monotonic time the stop was issued, for measuring gaps.
    #[serde(skip)]
    pub started_at: Instant,
    /// How long the scheduler slept before this injection.
    pub waited: Duration,
}

/// Counters for one scheduler. `attempts == succeeded + failed + skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureStats {
    /// Cycles that woke up and tried to inject.
    pub attempts: u64,
    /// Cycles that stopped and restarted an instance.
    pub succeeded: u64,
    /// Cycles where listing, stop or start failed.
    pub failed: u64,
    /// Cycles with no running instance to pick.
    pub skipped: u64,
    /// Stranded instances later restarted.
    pub recovered: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FailureCounters {
    pub attempts: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub skipped: AtomicU64,
    pub recovered: AtomicU64,
}

impl FailureCounters {
    pub fn snapshot(&self) -> FailureStats {
        FailureStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
        }
    }
}

/// Bounded event history, oldest dropped first.
#[derive(Debug)]
pub(crate) struct EventHistory {
    events: Mutex<VecDeque<FailureEvent>>,
    capacity: usize,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn push(&self, event: FailureEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn snapshot(&self) -> Vec<FailureEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_cluster::ServiceType;

    fn event(index: usize) -> FailureEvent {
        FailureEvent {
            instance: InstanceId::new(ServiceType::StorageNode, index),
            action: FailureAction::Start,
            outcome: FailureOutcome::Success,
            timestamp: SystemTime::now(),
            started_at: Instant::now(),
            waited: Duration::from_secs(1),
        }
    }

    #[test]
    fn history_drops_oldest_past_capacity() {
        let history = EventHistory::new(3);
        for i in 0..5 {
            history.push(event(i));
        }

        let kept: Vec<_> = history.snapshot().iter().map(|e| e.instance.index()).collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn event_serializes_without_monotonic_instant() {
        let json = serde_json::to_value(event(7)).unwrap();
        assert_eq!(json["instance"], "storage-node-7");
        assert_eq!(json["action"], "start");
        assert_eq!(json["outcome"], "success");
        assert!(json.get("started_at").is_none());
    }

    #[test]
    fn counters_snapshot() {
        let counters = FailureCounters::default();
        counters.attempts.fetch_add(3, Ordering::Relaxed);
        counters.skipped.fetch_add(1, Ordering::Relaxed);
        let stats = counters.snapshot();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.succeeded, 0);
    }
}
