//! Assertion helpers for chaos runs.
//!
//! Pure functions over the data a run produces (failure history, counters,
//! engine report). They take state as input and return pass/fail, so tests
//! and the CLI can both use them.

use crate::engine::EngineReport;
use crate::failure::{FailureEvent, FailureStats};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Result of an assertion check.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }
}

/// Assert that every gap between consecutive injections lies in
/// `[min - jitter, max + jitter]`.
///
/// Gaps are measured between the monotonic start times of successive events,
/// so `jitter` must cover downtime and cluster call latency.
pub fn assert_gaps_within(
    history: &[FailureEvent],
    min: Duration,
    max: Duration,
    jitter: Duration,
) -> AssertionResult {
    let lower = min.saturating_sub(jitter);
    let upper = max + jitter;

    for (i, pair) in history.windows(2).enumerate() {
        let gap = pair[1].started_at.duration_since(pair[0].started_at);
        if gap < lower || gap > upper {
            return AssertionResult::fail(
                "Injection gaps within interval",
                &format!(
                    "Gap {} ({} -> {}) was {:?}, allowed [{:?}, {:?}]",
                    i, pair[0].instance, pair[1].instance, gap, lower, upper
                ),
            );
        }
    }

    AssertionResult::pass(&format!(
        "{} injection gaps within [{:?}, {:?}]",
        history.len().saturating_sub(1),
        lower,
        upper
    ))
}

/// Assert that the number of successful injections falls in `expected`.
pub fn assert_injection_count_between(
    stats: &FailureStats,
    expected: RangeInclusive<u64>,
) -> AssertionResult {
    if expected.contains(&stats.succeeded) {
        AssertionResult::pass(&format!(
            "{} injections in {:?}",
            stats.succeeded, expected
        ))
    } else {
        AssertionResult::fail(
            "Injection count in range",
            &format!(
                "Expected {:?} injections, got {} ({} attempts, {} failed, {} skipped)",
                expected, stats.succeeded, stats.attempts, stats.failed, stats.skipped
            ),
        )
    }
}

/// Assert that every buffer went back to the pool and the pool never went
/// over capacity.
pub fn assert_no_leaked_buffers(report: &EngineReport, capacity: usize) -> AssertionResult {
    if report.buffers_in_use != 0 {
        return AssertionResult::fail(
            "No leaked buffers",
            &format!("{} buffers still checked out", report.buffers_in_use),
        );
    }
    if report.peak_buffers_in_use > capacity {
        return AssertionResult::fail(
            "No leaked buffers",
            &format!(
                "Peak {} buffers checked out exceeds capacity {}",
                report.peak_buffers_in_use, capacity
            ),
        );
    }
    AssertionResult::pass("All buffers returned")
}

/// Assert that no worker is still running.
pub fn assert_workers_drained(active_workers: usize) -> AssertionResult {
    if active_workers == 0 {
        AssertionResult::pass("All workers exited")
    } else {
        AssertionResult::fail(
            "All workers exited",
            &format!("{} workers still active", active_workers),
        )
    }
}

/// Assert that at most `max_ratio` of generator calls failed.
pub fn assert_failure_ratio_below(report: &EngineReport, max_ratio: f64) -> AssertionResult {
    let ratio = report.failure_ratio();
    if ratio <= max_ratio {
        AssertionResult::pass(&format!(
            "Failure ratio {:.3} <= {:.3}",
            ratio, max_ratio
        ))
    } else {
        AssertionResult::fail(
            "Failure ratio bounded",
            &format!(
                "{} of {} operations failed ({:.3} > {:.3})",
                report.failed(),
                report.failed() + report.succeeded(),
                ratio,
                max_ratio
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeneratorReport;
    use crate::failure::{FailureAction, FailureOutcome};
    use chaos_cluster::{InstanceId, ServiceType};
    use std::time::SystemTime;
    use tokio::time::Instant;

    fn history(gaps_secs: &[u64]) -> Vec<FailureEvent> {
        let base = Instant::now();
        let mut at = base;
        let mut events = vec![event(at)];
        for gap in gaps_secs {
            at += Duration::from_secs(*gap);
            events.push(event(at));
        }
        events
    }

    fn event(started_at: Instant) -> FailureEvent {
        FailureEvent {
            instance: InstanceId::new(ServiceType::StorageNode, 0),
            action: FailureAction::Start,
            outcome: FailureOutcome::Success,
            timestamp: SystemTime::now(),
            started_at,
            waited: Duration::ZERO,
        }
    }

    fn report(succeeded: u64, failed: u64) -> EngineReport {
        EngineReport {
            workers: 1,
            generators: vec![GeneratorReport {
                name: "random".into(),
                succeeded,
                failed,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn gaps_within_bounds_pass() {
        let result = assert_gaps_within(
            &history(&[5, 7, 10]),
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::ZERO,
        );
        assert!(result.passed);
    }

    #[test]
    fn gap_too_short_fails() {
        let result = assert_gaps_within(
            &history(&[5, 2]),
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_millis(500),
        );
        assert!(!result.passed);
        assert!(result.failure_details.unwrap().contains("Gap 1"));
    }

    #[test]
    fn jitter_widens_bounds() {
        let result = assert_gaps_within(
            &history(&[11]),
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        assert!(result.passed);
    }

    #[test]
    fn single_event_has_no_gaps() {
        let result = assert_gaps_within(
            &history(&[]),
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::ZERO,
        );
        assert!(result.passed);
    }

    #[test]
    fn injection_count_range() {
        let stats = FailureStats {
            attempts: 8,
            succeeded: 7,
            failed: 1,
            ..Default::default()
        };
        assert!(assert_injection_count_between(&stats, 4..=12).passed);
        assert!(!assert_injection_count_between(&stats, 8..=12).passed);
    }

    #[test]
    fn leaked_buffer_detected() {
        let mut r = report(10, 0);
        assert!(assert_no_leaked_buffers(&r, 2).passed);

        r.buffers_in_use = 1;
        assert!(!assert_no_leaked_buffers(&r, 2).passed);

        r.buffers_in_use = 0;
        r.peak_buffers_in_use = 3;
        assert!(!assert_no_leaked_buffers(&r, 2).passed);
    }

    #[test]
    fn workers_drained() {
        assert!(assert_workers_drained(0).passed);
        assert!(!assert_workers_drained(2).passed);
    }

    #[test]
    fn failure_ratio() {
        assert!(assert_failure_ratio_below(&report(90, 10), 0.1).passed);
        assert!(!assert_failure_ratio_below(&report(80, 20), 0.1).passed);
        assert!(assert_failure_ratio_below(&report(0, 0), 0.0).passed);
    }
}
