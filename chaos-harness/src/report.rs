//! End-of-run summary.

use crate::engine::EngineReport;
use crate::failure::{FailureEvent, FailureStats};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// What happened during a chaos run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Volume the load was written to.
    pub volume: String,
    /// Wall time from starting load to the end of teardown.
    pub elapsed: Duration,
    /// Whether the run was cut short by an interrupt.
    pub interrupted: bool,
    /// Failure scheduler counters (`None` when chaos was disabled).
    pub failures: Option<FailureStats>,
    /// Recent failure events, oldest first.
    pub failure_history: Vec<FailureEvent>,
    /// Load engine summary.
    pub load: EngineReport,
}

impl RunReport {
    /// Whether the run finished without degraded workers or leaked buffers.
    pub fn is_clean(&self) -> bool {
        self.load.degraded_workers == 0 && self.load.buffers_in_use == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Chaos run on volume {} ({:.1}s{})",
            self.volume,
            self.elapsed.as_secs_f64(),
            if self.interrupted { ", interrupted" } else { "" }
        )?;

        match &self.failures {
            Some(s) => writeln!(
                f,
                "  failures:  {} injected, {} failed, {} skipped, {} recovered",
                s.succeeded, s.failed, s.skipped, s.recovered
            )?,
            None => writeln!(f, "  failures:  disabled")?,
        }

        writeln!(
            f,
            "  load:      {} ok, {} failed ({:.2}% failure), {} workers, {} degraded",
            self.load.succeeded(),
            self.load.failed(),
            self.load.failure_ratio() * 100.0,
            self.load.workers,
            self.load.degraded_workers
        )?;
        writeln!(
            f,
            "  buffers:   peak {} in use, {} checkout timeouts",
            self.load.peak_buffers_in_use, self.load.checkout_timeouts
        )?;

        for g in &self.load.generators {
            writeln!(
                f,
                "  {:<11} {} ok, {} failed, {} written, {} read",
                format!("{}:", g.name),
                g.succeeded,
                g.failed,
                g.bytes_written,
                g.bytes_read
            )?;
        }
        Ok(())
    }
}
