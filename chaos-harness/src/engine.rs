//! Load generator engine.
//!
//! A pool of worker tasks repeatedly picks a [`LoadGenerator`], borrows a
//! buffer from the shared [`BufferPool`], runs one `generate` call and
//! records the outcome. Workers run until the configured duration elapses or
//! [`LoadGeneratorEngine::shutdown_load_generator`] is called.
//!
//! Worker failure handling:
//! - cluster operation errors are counted per generator; the worker goes on
//! - fatal errors (data corruption) and panics end that worker only and are
//!   reported as degraded workers

use crate::buffer::{BufferPool, PoolError};
use crate::error::{HarnessError, Result};
use crate::load::{LoadContext, LoadGenerator, OpSummary};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a worker picks the generator for its next iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    /// Uniformly at random.
    #[default]
    Random,
    /// Cycle through generators in order, shared across workers.
    RoundRobin,
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
struct GeneratorCounters {
    operations: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

impl GeneratorCounters {
    fn record_success(&self, summary: OpSummary) {
        self.operations
            .fetch_add(summary.operations as u64, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(summary.bytes_written, Ordering::Relaxed);
        self.bytes_read.fetch_add(summary.bytes_read, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-generator outcome counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratorReport {
    /// Generator name.
    pub name: String,
    /// `generate` calls that succeeded.
    pub succeeded: u64,
    /// `generate` calls that failed.
    pub failed: u64,
    /// Cluster calls issued by successful invocations.
    pub operations: u64,
    /// Payload bytes written.
    pub bytes_written: u64,
    /// Payload bytes read and verified.
    pub bytes_read: u64,
}

/// Snapshot of engine activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineReport {
    /// Configured worker count.
    pub workers: usize,
    /// Time since `start_io` (until shutdown, once shut down).
    pub elapsed: Duration,
    /// Workers ended by a fatal error or panic.
    pub degraded_workers: u64,
    /// Buffer checkouts that timed out.
    pub checkout_timeouts: u64,
    /// Buffers checked out at the time of the snapshot.
    pub buffers_in_use: usize,
    /// Most buffers checked out at once.
    pub peak_buffers_in_use: usize,
    /// Per-generator counts, in registration order.
    pub generators: Vec<GeneratorReport>,
}

impl EngineReport {
    /// Successful `generate` calls across all generators.
    pub fn succeeded(&self) -> u64 {
        self.generators.iter().map(|g| g.succeeded).sum()
    }

    /// Failed `generate` calls across all generators.
    pub fn failed(&self) -> u64 {
        self.generators.iter().map(|g| g.failed).sum()
    }

    /// Fraction of `generate` calls that failed (0 when nothing ran).
    pub fn failure_ratio(&self) -> f64 {
        let total = self.succeeded() + self.failed();
        if total == 0 {
            0.0
        } else {
            self.failed() as f64 / total as f64
        }
    }

    /// Report for the generator named `name`.
    pub fn generator(&self, name: &str) -> Option<&GeneratorReport> {
        self.generators.iter().find(|g| g.name == name)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`LoadGeneratorEngine`].
pub struct EngineBuilder {
    workers: usize,
    pool: Option<BufferPool>,
    generators: Vec<Arc<dyn LoadGenerator>>,
    selection: Selection,
    checkout_timeout: Duration,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            workers: 5,
            pool: None,
            generators: Vec::new(),
            selection: Selection::Random,
            checkout_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineBuilder {
    /// Number of worker tasks.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Buffer pool shared by the workers. Defaults to 16 buffers sized for
    /// the largest payload.
    pub fn pool(mut self, pool: BufferPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Add one generator.
    pub fn generator(mut self, generator: Arc<dyn LoadGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    /// Add several generators.
    pub fn generators(mut self, generators: impl IntoIterator<Item = Arc<dyn LoadGenerator>>) -> Self {
        self.generators.extend(generators);
        self
    }

    /// Generator selection policy.
    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Longest a worker waits for a buffer before retrying.
    pub fn checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    /// Build the engine over `ctx`.
    pub fn build(self, ctx: LoadContext) -> Result<LoadGeneratorEngine> {
        if self.workers == 0 {
            return Err(HarnessError::InvalidEngine("no workers".into()));
        }
        if self.generators.is_empty() {
            return Err(HarnessError::InvalidEngine("no load generators".into()));
        }

        let pool = self
            .pool
            .unwrap_or_else(|| BufferPool::new(16, ctx.payload.max_len()));
        let counters = self
            .generators
            .iter()
            .map(|_| GeneratorCounters::default())
            .collect();

        Ok(LoadGeneratorEngine {
            shared: Arc::new(EngineShared {
                ctx,
                generators: self.generators,
                counters,
                pool,
                selection: self.selection,
                checkout_timeout: self.checkout_timeout,
                next: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                drained: Notify::new(),
                degraded: AtomicU64::new(0),
                checkout_timeouts: AtomicU64::new(0),
            }),
            workers: self.workers,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            handles: tokio::sync::Mutex::new(Vec::new()),
            window: Mutex::new((None, None)),
        })
    }
}

// ============================================================================
// Engine
// ============================================================================

struct EngineShared {
    ctx: LoadContext,
    generators: Vec<Arc<dyn LoadGenerator>>,
    counters: Vec<GeneratorCounters>,
    pool: BufferPool,
    selection: Selection,
    checkout_timeout: Duration,
    next: AtomicUsize,
    active: AtomicUsize,
    // signalled when the last worker exits
    drained: Notify,
    degraded: AtomicU64,
    checkout_timeouts: AtomicU64,
}

impl EngineShared {
    fn select(&self) -> usize {
        let n = self.generators.len();
        match self.selection {
            Selection::Random => rand::thread_rng().gen_range(0..n),
            Selection::RoundRobin => self.next.fetch_add(1, Ordering::Relaxed) % n,
        }
    }
}

/// Decrements the active-worker gauge however the worker exits. The gauge is
/// raised for every worker before any is spawned.
struct ActiveGuard(Arc<EngineShared>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.drained.notify_one();
        }
    }
}

/// Why a worker returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Stopped,
    Fatal,
}

/// Runs load generators from a pool of worker tasks.
pub struct LoadGeneratorEngine {
    shared: Arc<EngineShared>,
    workers: usize,
    cancel: CancellationToken,
    started: AtomicBool,
    handles: tokio::sync::Mutex<Vec<JoinHandle<WorkerExit>>>,
    // (started, stopped)
    window: Mutex<(Option<Instant>, Option<Instant>)>,
}

impl LoadGeneratorEngine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Run every generator's one-time initialization, in order.
    pub async fn initialize(&self) -> Result<()> {
        for generator in &self.shared.generators {
            generator
                .initialize(&self.shared.ctx)
                .await
                .map_err(|source| HarnessError::GeneratorInit {
                    generator: generator.name().to_string(),
                    source,
                })?;
            tracing::debug!("Initialized load generator {}", generator.name());
        }
        Ok(())
    }

    /// Spawn the workers and drive load for `duration`, until
    /// [`shutdown_load_generator`](Self::shutdown_load_generator) is called,
    /// or until every worker has ended on a fatal error.
    ///
    /// Returns once every worker has exited.
    pub async fn start_io(&self, duration: Duration) -> Result<EngineReport> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HarnessError::AlreadyStarted("load generator engine"));
        }

        {
            let mut handles = self.handles.lock().await;
            self.lock_window().0 = Some(Instant::now());
            self.shared.active.fetch_add(self.workers, Ordering::AcqRel);
            for id in 0..self.workers {
                handles.push(tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&self.shared),
                    self.cancel.clone(),
                )));
            }
        }

        tracing::info!(
            "Load generator started: {} workers, {} buffers, generators [{}], {:?}",
            self.workers,
            self.shared.pool.capacity(),
            self.generator_names().join(", "),
            duration
        );

        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                tracing::info!("Load duration elapsed");
            }
            _ = self.cancel.cancelled() => {}
            _ = self.shared.drained.notified() => {
                tracing::warn!("Every load worker exited before the deadline");
            }
        }

        self.shutdown_load_generator().await;
        Ok(self.stats())
    }

    /// Stop all workers and wait for them to exit. Safe to call repeatedly
    /// and concurrently; every call returns after the workers are gone.
    pub async fn shutdown_load_generator(&self) {
        self.cancel.cancel();

        let mut handles = self.handles.lock().await;
        if handles.is_empty() {
            return;
        }

        let mut stopped = 0;
        for handle in handles.drain(..) {
            match handle.await {
                Ok(WorkerExit::Stopped) => stopped += 1,
                // already counted by the worker
                Ok(WorkerExit::Fatal) => {}
                Err(e) => {
                    self.shared.degraded.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Load worker ended abnormally: {}", e);
                }
            }
        }

        let mut window = self.lock_window();
        if window.1.is_none() {
            window.1 = Some(Instant::now());
        }
        drop(window);

        tracing::info!(
            "Load generator stopped: {} workers exited cleanly, {} degraded",
            stopped,
            self.shared.degraded.load(Ordering::Relaxed)
        );
    }

    /// Workers currently running.
    pub fn active_workers(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// The shared buffer pool.
    pub fn pool(&self) -> &BufferPool {
        &self.shared.pool
    }

    /// Names of the registered generators, in order.
    pub fn generator_names(&self) -> Vec<&'static str> {
        self.shared.generators.iter().map(|g| g.name()).collect()
    }

    /// Current statistics.
    pub fn stats(&self) -> EngineReport {
        let (started, stopped) = *self.lock_window();
        let elapsed = match (started, stopped) {
            (Some(start), Some(stop)) => stop - start,
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };

        let shared = &self.shared;
        EngineReport {
            workers: self.workers,
            elapsed,
            degraded_workers: shared.degraded.load(Ordering::Relaxed),
            checkout_timeouts: shared.checkout_timeouts.load(Ordering::Relaxed),
            buffers_in_use: shared.pool.in_use(),
            peak_buffers_in_use: shared.pool.peak_in_use(),
            generators: shared
                .generators
                .iter()
                .zip(&shared.counters)
                .map(|(g, c)| GeneratorReport {
                    name: g.name().to_string(),
                    succeeded: c.succeeded.load(Ordering::Relaxed),
                    failed: c.failed.load(Ordering::Relaxed),
                    operations: c.operations.load(Ordering::Relaxed),
                    bytes_written: c.bytes_written.load(Ordering::Relaxed),
                    bytes_read: c.bytes_read.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, (Option<Instant>, Option<Instant>)> {
        self.window
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for LoadGeneratorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGeneratorEngine")
            .field("workers", &self.workers)
            .field("generators", &self.generator_names())
            .field("active", &self.active_workers())
            .finish()
    }
}

async fn worker_loop(id: usize, shared: Arc<EngineShared>, cancel: CancellationToken) -> WorkerExit {
    let _active = ActiveGuard(Arc::clone(&shared));
    tracing::debug!("Load worker {} started", id);

    loop {
        if cancel.is_cancelled() {
            return WorkerExit::Stopped;
        }

        let slot = shared.select();
        let generator = &shared.generators[slot];

        let mut buf = tokio::select! {
            biased;
            _ = cancel.cancelled() => return WorkerExit::Stopped,
            checkout = shared.pool.checkout_timeout(shared.checkout_timeout) => match checkout {
                Ok(buf) => buf,
                Err(PoolError::Timeout { waited }) => {
                    shared.checkout_timeouts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Worker {} waited {:?} for a buffer, retrying", id, waited);
                    continue;
                }
                Err(PoolError::Closed) => return WorkerExit::Stopped,
            },
        };

        let result = generator.generate(&shared.ctx, &mut buf).await;
        drop(buf);

        let counters = &shared.counters[slot];
        match result {
            Ok(summary) => counters.record_success(summary),
            Err(e) if e.is_fatal() => {
                counters.record_failure();
                shared.degraded.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "Load worker {} stopping after {} failure: {}",
                    id,
                    generator.name(),
                    e
                );
                return WorkerExit::Fatal;
            }
            Err(e) => {
                counters.record_failure();
                tracing::warn!("{} operation failed: {}", generator.name(), e);
            }
        }

        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::load::test_support::context;
    use crate::load::{RandomLoad, ReadOnlyLoad};
    use async_trait::async_trait;
    use chaos_cluster::ClusterError;

    /// Succeeds every time.
    struct CountingLoad(&'static str);

    #[async_trait]
    impl LoadGenerator for CountingLoad {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn generate(&self, _ctx: &LoadContext, buf: &mut Vec<u8>) -> std::result::Result<OpSummary, LoadError> {
            buf.extend_from_slice(b"work");
            Ok(OpSummary {
                operations: 1,
                ..Default::default()
            })
        }
    }

    /// Fails every other call with a transient error.
    #[derive(Default)]
    struct FlakyLoad(AtomicU64);

    #[async_trait]
    impl LoadGenerator for FlakyLoad {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn generate(&self, _ctx: &LoadContext, _buf: &mut Vec<u8>) -> std::result::Result<OpSummary, LoadError> {
            if self.0.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
                Err(ClusterError::unavailable("node down").into())
            } else {
                Ok(OpSummary::default())
            }
        }
    }

    /// Reports corruption on every call.
    struct CorruptLoad;

    #[async_trait]
    impl LoadGenerator for CorruptLoad {
        fn name(&self) -> &'static str {
            "corrupt"
        }

        async fn generate(&self, _ctx: &LoadContext, _buf: &mut Vec<u8>) -> std::result::Result<OpSummary, LoadError> {
            Err(LoadError::Corruption {
                key: "k".into(),
                expected_len: 1,
                actual_len: 0,
            })
        }
    }

    struct PanicLoad;

    #[async_trait]
    impl LoadGenerator for PanicLoad {
        fn name(&self) -> &'static str {
            "panic"
        }

        async fn generate(&self, _ctx: &LoadContext, _buf: &mut Vec<u8>) -> std::result::Result<OpSummary, LoadError> {
            panic!("generator bug");
        }
    }

    /// Fails initialization.
    struct BrokenInit;

    #[async_trait]
    impl LoadGenerator for BrokenInit {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn initialize(&self, _ctx: &LoadContext) -> std::result::Result<(), LoadError> {
            Err(ClusterError::unavailable("no quorum").into())
        }

        async fn generate(&self, _ctx: &LoadContext, _buf: &mut Vec<u8>) -> std::result::Result<OpSummary, LoadError> {
            Ok(OpSummary::default())
        }
    }

    const RUN: Duration = Duration::from_millis(200);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn healthy_cluster_runs_without_failures() {
        let (_cluster, ctx) = context(16, 128).await;
        let engine = LoadGeneratorEngine::builder()
            .workers(4)
            .pool(BufferPool::new(4, 128))
            .generator(Arc::new(RandomLoad::new()))
            .generator(Arc::new(ReadOnlyLoad::new(10)))
            .build(ctx)
            .unwrap();

        engine.initialize().await.unwrap();
        let report = engine.start_io(RUN).await.unwrap();

        assert!(report.succeeded() > 0);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.degraded_workers, 0);
        assert_eq!(report.buffers_in_use, 0);
        assert_eq!(engine.active_workers(), 0);
        assert!(report.elapsed >= RUN);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn few_buffers_many_workers_no_deadlock() {
        let (_cluster, ctx) = context(16, 64).await;
        let pool = BufferPool::new(2, 64);
        let engine = LoadGeneratorEngine::builder()
            .workers(8)
            .pool(pool.clone())
            .generator(Arc::new(RandomLoad::new()))
            .checkout_timeout(Duration::from_millis(50))
            .build(ctx)
            .unwrap();

        let report = engine.start_io(RUN).await.unwrap();

        assert!(report.succeeded() > 0);
        assert!(report.peak_buffers_in_use <= 2);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.checkouts(), pool.returns());
        assert_eq!(engine.active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn operation_errors_are_counted_not_fatal() {
        let (_cluster, ctx) = context(8, 8).await;
        let engine = LoadGeneratorEngine::builder()
            .workers(2)
            .generator(Arc::new(FlakyLoad::default()))
            .build(ctx)
            .unwrap();

        let report = engine.start_io(RUN).await.unwrap();
        let flaky = report.generator("flaky").unwrap();

        assert!(flaky.failed > 0);
        assert!(flaky.succeeded > 0);
        assert_eq!(report.degraded_workers, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn corruption_ends_only_that_worker() {
        let (_cluster, ctx) = context(8, 8).await;
        let pool = BufferPool::new(2, 8);
        let engine = LoadGeneratorEngine::builder()
            .workers(3)
            .pool(pool.clone())
            .generator(Arc::new(CorruptLoad))
            .build(ctx)
            .unwrap();

        let report = engine.start_io(RUN).await.unwrap();

        assert_eq!(report.degraded_workers, 3);
        assert_eq!(report.generator("corrupt").unwrap().failed, 3);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(engine.active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_ends_once_every_worker_is_degraded() {
        let (_cluster, ctx) = context(8, 8).await;
        let engine = LoadGeneratorEngine::builder()
            .workers(4)
            .generator(Arc::new(CorruptLoad))
            .build(ctx)
            .unwrap();

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            engine.start_io(Duration::from_secs(24 * 3600)),
        )
        .await
        .expect("start_io should return once no worker is left")
        .unwrap();

        assert_eq!(report.degraded_workers, 4);
        assert!(report.elapsed < Duration::from_secs(5));
        assert_eq!(engine.active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_generator_degrades_and_returns_buffers() {
        let (_cluster, ctx) = context(8, 8).await;
        let pool = BufferPool::new(2, 8);
        let engine = LoadGeneratorEngine::builder()
            .workers(2)
            .pool(pool.clone())
            .generator(Arc::new(PanicLoad))
            .build(ctx)
            .unwrap();

        let report = engine.start_io(RUN).await.unwrap();

        assert_eq!(report.degraded_workers, 2);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(engine.active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn round_robin_spreads_evenly() {
        let (_cluster, ctx) = context(8, 8).await;
        let engine = LoadGeneratorEngine::builder()
            .workers(2)
            .selection(Selection::RoundRobin)
            .generator(Arc::new(CountingLoad("a")))
            .generator(Arc::new(CountingLoad("b")))
            .build(ctx)
            .unwrap();

        let report = engine.start_io(RUN).await.unwrap();
        let a = report.generator("a").unwrap().succeeded;
        let b = report.generator("b").unwrap().succeeded;

        assert!(a > 0 && b > 0);
        // each worker may drop one selection at shutdown
        assert!(a.abs_diff(b) <= 3, "a={} b={}", a, b);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_stops_early_and_is_idempotent() {
        let (_cluster, ctx) = context(8, 8).await;
        let engine = Arc::new(
            LoadGeneratorEngine::builder()
                .workers(3)
                .generator(Arc::new(CountingLoad("count")))
                .build(ctx)
                .unwrap(),
        );

        let run = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.start_io(Duration::from_secs(3600)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            engine.start_io(RUN).await,
            Err(HarnessError::AlreadyStarted(_))
        ));

        tokio::join!(engine.shutdown_load_generator(), engine.shutdown_load_generator());
        engine.shutdown_load_generator().await;
        assert_eq!(engine.active_workers(), 0);

        let report = run.await.unwrap().unwrap();
        assert!(report.elapsed < Duration::from_secs(3600));
        assert!(report.succeeded() > 0);
    }

    #[tokio::test]
    async fn shutdown_before_start_is_noop() {
        let (_cluster, ctx) = context(8, 8).await;
        let engine = LoadGeneratorEngine::builder()
            .generator(Arc::new(CountingLoad("count")))
            .build(ctx)
            .unwrap();

        engine.shutdown_load_generator().await;
        assert_eq!(engine.active_workers(), 0);
        assert_eq!(engine.stats().succeeded(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn exhausted_pool_counts_checkout_timeouts() {
        let (_cluster, ctx) = context(8, 8).await;
        let pool = BufferPool::new(1, 8);
        let held = pool.checkout().await.unwrap();
        let engine = LoadGeneratorEngine::builder()
            .workers(2)
            .pool(pool.clone())
            .checkout_timeout(Duration::from_millis(10))
            .generator(Arc::new(CountingLoad("count")))
            .build(ctx)
            .unwrap();

        let report = engine.start_io(RUN).await.unwrap();
        drop(held);

        assert!(report.checkout_timeouts > 0);
        assert_eq!(report.succeeded(), 0);
        assert_eq!(engine.active_workers(), 0);
    }

    #[tokio::test]
    async fn initialize_failure_names_generator() {
        let (_cluster, ctx) = context(8, 8).await;
        let engine = LoadGeneratorEngine::builder()
            .generator(Arc::new(CountingLoad("count")))
            .generator(Arc::new(BrokenInit))
            .build(ctx)
            .unwrap();

        match engine.initialize().await.unwrap_err() {
            HarnessError::GeneratorInit { generator, .. } => assert_eq!(generator, "broken"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn build_rejects_empty_engine() {
        let (_cluster, ctx) = context(8, 8).await;
        assert!(matches!(
            LoadGeneratorEngine::builder().build(ctx.clone()),
            Err(HarnessError::InvalidEngine(_))
        ));
        assert!(matches!(
            LoadGeneratorEngine::builder()
                .workers(0)
                .generator(Arc::new(CountingLoad("count")))
                .build(ctx),
            Err(HarnessError::InvalidEngine(_))
        ));
    }

    #[test]
    fn selection_serde_names() {
        assert_eq!(
            serde_json::to_string(&Selection::RoundRobin).unwrap(),
            "\"round-robin\""
        );
        assert_eq!(Selection::default(), Selection::Random);
    }
}
