//! Chaos run orchestrator.
//!
//! Owns the lifecycle of one chaos run: setup (readiness, volume, buffer
//! pool, generators), the concurrent failure scheduler and load engine, and
//! teardown in a fixed order: load engine, then failure scheduler, then
//! cluster release.

use crate::buffer::BufferPool;
use crate::config::RunConfig;
use crate::engine::{EngineReport, LoadGeneratorEngine};
use crate::error::{HarnessError, Result};
use crate::failure::FailureScheduler;
use crate::load::{build_generators, LoadContext, PayloadSpec};
use crate::report::RunReport;
use chaos_cluster::{Cluster, ObjectStore};
use rand::distributions::Uniform;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const VOLUME_NAME_LEN: usize = 10;

/// Random lowercase volume name, unique enough to keep runs apart.
pub fn random_volume_name() -> String {
    rand::thread_rng()
        .sample_iter(Uniform::new_inclusive(b'a', b'z'))
        .take(VOLUME_NAME_LEN)
        .map(char::from)
        .collect()
}

/// One chaos run against a cluster.
///
/// # Example
///
/// ```ignore
/// let harness = ChaosHarness::setup(config, cluster).await?;
/// let report = harness.run(tokio::signal::ctrl_c().map(|_| ())).await?;
/// println!("{}", report);
/// ```
pub struct ChaosHarness<C> {
    config: Arc<RunConfig>,
    cluster: Arc<C>,
    volume: String,
    engine: LoadGeneratorEngine,
    scheduler: FailureScheduler,
    // true once the cluster has been released
    released: tokio::sync::Mutex<bool>,
}

impl<C> ChaosHarness<C>
where
    C: Cluster + ObjectStore + 'static,
{
    /// Prepare a run. Nothing is running when this returns an error, and the
    /// cluster has been released.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::Config`] if `config` fails validation
    /// - [`HarnessError::ReadyTimeout`] if the cluster is not ready in time
    /// - [`HarnessError::Cluster`] if readiness or volume creation fails
    /// - [`HarnessError::GeneratorInit`] if a load generator cannot initialize
    pub async fn setup(config: Arc<RunConfig>, cluster: Arc<C>) -> Result<Self> {
        match Self::prepare(config, Arc::clone(&cluster)).await {
            Ok(harness) => Ok(harness),
            Err(e) => {
                tracing::error!("Chaos harness setup failed: {}", e);
                if let Err(release) = cluster.shutdown().await {
                    tracing::warn!("Failed to release cluster after setup error: {}", release);
                }
                Err(e)
            }
        }
    }

    async fn prepare(config: Arc<RunConfig>, cluster: Arc<C>) -> Result<Self> {
        config.validate()?;

        let timeout = config.cluster.ready_timeout();
        tracing::info!("Waiting up to {:?} for cluster readiness", timeout);
        match tokio::time::timeout(timeout, cluster.wait_ready()).await {
            Ok(result) => result?,
            Err(_) => return Err(HarnessError::ReadyTimeout { timeout }),
        }

        let volume = random_volume_name();
        cluster.create_volume(&volume).await?;
        tracing::info!("Created volume {}", volume);

        let load = &config.load;
        let ctx = LoadContext {
            store: Arc::clone(&cluster) as Arc<dyn ObjectStore>,
            volume: volume.clone(),
            payload: PayloadSpec::new(load.min_payload_bytes, load.max_payload_bytes),
        };
        let engine = LoadGeneratorEngine::builder()
            .workers(load.workers)
            .pool(BufferPool::new(load.buffers, load.max_payload_bytes))
            .generators(build_generators(load))
            .selection(load.selection)
            .checkout_timeout(load.checkout_timeout())
            .build(ctx)?;
        engine.initialize().await?;

        let scheduler = FailureScheduler::new(
            Arc::clone(&cluster) as Arc<dyn Cluster>,
            config.failure.service,
            config.failure.downtime(),
        );

        tracing::info!(
            "Chaos harness ready: volume {}, generators [{}]",
            volume,
            engine.generator_names().join(", ")
        );

        Ok(Self {
            config,
            cluster,
            volume,
            engine,
            scheduler,
            released: tokio::sync::Mutex::new(false),
        })
    }

    /// Start injecting failures at random intervals in `[min, max]`.
    pub fn start_chaos(&self, min: Duration, max: Duration) -> Result<()> {
        self.scheduler.start(min, max)
    }

    /// Drive load for `duration` (or until shut down) and return the engine summary.
    pub async fn start_io(&self, duration: Duration) -> Result<EngineReport> {
        self.engine.start_io(duration).await
    }

    /// Tear down in order: load engine, failure scheduler, cluster.
    ///
    /// Safe to call repeatedly and concurrently. Only the first call
    /// releases the cluster.
    pub async fn shutdown(&self) -> Result<()> {
        self.engine.shutdown_load_generator().await;
        self.scheduler.stop().await;

        let mut released = self.released.lock().await;
        if *released {
            return Ok(());
        }
        *released = true;
        self.cluster.shutdown().await?;
        tracing::info!("Cluster released");
        Ok(())
    }

    /// Full run: chaos (if enabled) and load concurrently, for the configured
    /// duration or until `interrupt` resolves, then teardown.
    ///
    /// Teardown runs even if starting either engine failed.
    pub async fn run<F>(&self, interrupt: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let begin = Instant::now();
        let failure = &self.config.failure;

        let started = if failure.enabled {
            self.start_chaos(failure.min_interval(), failure.max_interval())
        } else {
            tracing::info!("Failure injection disabled");
            Ok(())
        };

        let mut interrupted = false;
        let outcome = match started {
            Ok(()) => tokio::select! {
                result = self.start_io(self.config.load.duration()) => result.map(|_| ()),
                _ = interrupt => {
                    tracing::info!("Interrupted, shutting down");
                    interrupted = true;
                    Ok(())
                }
            },
            Err(e) => Err(e),
        };

        let teardown = self.shutdown().await;
        outcome?;
        teardown?;

        Ok(RunReport {
            volume: self.volume.clone(),
            elapsed: begin.elapsed(),
            interrupted,
            failures: failure.enabled.then(|| self.scheduler.stats()),
            failure_history: self.scheduler.history(),
            load: self.engine.stats(),
        })
    }

    /// Volume the load writes to.
    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The load engine.
    pub fn engine(&self) -> &LoadGeneratorEngine {
        &self.engine
    }

    /// The failure scheduler.
    pub fn scheduler(&self) -> &FailureScheduler {
        &self.scheduler
    }
}

impl<C> std::fmt::Debug for ChaosHarness<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosHarness")
            .field("volume", &self.volume)
            .field("engine", &self.engine)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
