use super::injector::{restart, FailureInjector, InjectError};
use super::{
    EventHistory, FailureAction, FailureCounters, FailureEvent, FailureOutcome, FailureStats,
    HISTORY_CAPACITY,
};
use crate::error::{HarnessError, Result};
use chaos_cluster::{Cluster, InstanceId, ServiceType};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// State shared between the scheduler handle and its background task.
#[derive(Debug)]
struct SchedulerShared {
    counters: FailureCounters,
    history: EventHistory,
    stranded: Mutex<Vec<InstanceId>>,
}

impl SchedulerShared {
    fn strand(&self, instance: InstanceId) {
        let mut stranded = self
            .stranded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !stranded.contains(&instance) {
            stranded.push(instance);
        }
    }

    fn take_stranded(&self) -> Vec<InstanceId> {
        std::mem::take(
            &mut *self
                .stranded
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// Try to restart every stranded instance; keep the ones that still fail.
    async fn recover(&self, cluster: &dyn Cluster) {
        for instance in self.take_stranded() {
            match restart(cluster, &instance).await {
                Ok(()) => {
                    self.counters.recovered.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => self.strand(instance),
            }
        }
    }

    fn record(&self, mut event: FailureEvent, waited: Duration) {
        event.waited = waited;
        match &event.outcome {
            FailureOutcome::Success => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            FailureOutcome::Error(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                if event.action == FailureAction::Start {
                    self.strand(event.instance);
                }
            }
        }
        self.history.push(event);
    }
}

/// Periodically injects failures from a background task.
///
/// ```text
/// start(min, max)
///   loop:
///     sleep uniform[min, max]   <- stop() interrupts here
///     restart stranded instances
///     inject_once
/// stop()
///   cancel, join, restart stranded instances
/// ```
pub struct FailureScheduler {
    cluster: Arc<dyn Cluster>,
    injector: FailureInjector,
    shared: Arc<SchedulerShared>,
    cancel: CancellationToken,
    started: AtomicBool,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl FailureScheduler {
    /// Scheduler that fails instances of `service`, keeping each down for `downtime`.
    pub fn new(cluster: Arc<dyn Cluster>, service: ServiceType, downtime: Duration) -> Self {
        let cancel = CancellationToken::new();
        Self {
            cluster,
            injector: FailureInjector::new(service, downtime).with_shutdown(cancel.clone()),
            shared: Arc::new(SchedulerShared {
                counters: FailureCounters::default(),
                history: EventHistory::new(HISTORY_CAPACITY),
                stranded: Mutex::new(Vec::new()),
            }),
            cancel,
            started: AtomicBool::new(false),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Start injecting failures at random intervals in `[min, max]`.
    ///
    /// Must be called from within a tokio runtime. A scheduler runs once;
    /// starting it again is an error, even after [`stop`](Self::stop).
    pub fn start(&self, min: Duration, max: Duration) -> Result<()> {
        if min > max {
            return Err(HarnessError::InvalidInterval { min, max });
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HarnessError::AlreadyStarted("failure scheduler"));
        }

        tracing::info!(
            "Failure scheduler started: target {}, interval [{:?}, {:?}]",
            self.injector.service(),
            min,
            max
        );

        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.cluster),
            self.injector.clone(),
            Arc::clone(&self.shared),
            self.cancel.clone(),
            min,
            max,
        ));

        // Contended only by a concurrent stop(), which has already cancelled
        // the token, so the detached loop exits on its own.
        if let Ok(mut task) = self.task.try_lock() {
            *task = Some(handle);
        }
        Ok(())
    }

    /// Stop injecting and wait for the background task to finish.
    ///
    /// Any instance left down by a failed restart gets one more restart
    /// attempt. Safe to call repeatedly and concurrently.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                tracing::error!("Failure scheduler task ended abnormally: {}", e);
            }
            self.shared.recover(self.cluster.as_ref()).await;

            let stats = self.stats();
            tracing::info!(
                "Failure scheduler stopped: {} attempts, {} succeeded, {} failed, {} skipped, {} recovered",
                stats.attempts,
                stats.succeeded,
                stats.failed,
                stats.skipped,
                stats.recovered
            );
        }
    }

    /// Whether [`start`](Self::start) has been called and [`stop`](Self::stop) has not.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    /// Current counters.
    pub fn stats(&self) -> FailureStats {
        self.shared.counters.snapshot()
    }

    /// Recent injections, oldest first.
    pub fn history(&self) -> Vec<FailureEvent> {
        self.shared.history.snapshot()
    }

    /// Instances whose restart failed and has not yet succeeded.
    pub fn stranded(&self) -> Vec<InstanceId> {
        self.shared
            .stranded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for FailureScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureScheduler")
            .field("injector", &self.injector)
            .field("stats", &self.stats())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_loop(
    cluster: Arc<dyn Cluster>,
    injector: FailureInjector,
    shared: Arc<SchedulerShared>,
    cancel: CancellationToken,
    min: Duration,
    max: Duration,
) {
    loop {
        let wait = rand::thread_rng().gen_range(min..=max);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        shared.recover(cluster.as_ref()).await;

        shared.counters.attempts.fetch_add(1, Ordering::Relaxed);
        match injector.inject_once(cluster.as_ref()).await {
            Ok(event) => shared.record(event, wait),
            Err(InjectError::NoCandidates(service)) => {
                shared.counters.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::info!("No running {} instances, skipping injection", service);
            }
            Err(e) => {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Failure injection failed: {}", e);
            }
        }

        // Zero-length intervals must not starve other tasks.
        tokio::task::yield_now().await;
    }
    tracing::debug!("Failure scheduler loop exited");
}
