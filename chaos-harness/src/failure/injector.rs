use super::{FailureAction, FailureEvent, FailureOutcome};
use chaos_cluster::{Cluster, ClusterError, InstanceId, ServiceType};
use rand::seq::SliceRandom;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why no instance was stopped.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    /// Every instance of the target type is already down.
    #[error("no running {0} instances to fail")]
    NoCandidates(ServiceType),

    /// Listing candidates failed.
    #[error("failed to list {service} instances: {source}")]
    List {
        /// Target service type.
        service: ServiceType,
        /// Underlying cluster error.
        #[source]
        source: ClusterError,
    },
}

/// Stops one random running instance of a service type and starts it again.
#[derive(Debug, Clone)]
pub struct FailureInjector {
    service: ServiceType,
    downtime: Duration,
    shutdown: CancellationToken,
}

impl FailureInjector {
    /// Injector targeting `service`, keeping each victim down for `downtime`.
    pub fn new(service: ServiceType, downtime: Duration) -> Self {
        Self {
            service,
            downtime,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cut the downtime wait short when `token` is cancelled.
    /// The restart still runs.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Target service type.
    pub fn service(&self) -> ServiceType {
        self.service
    }

    /// Run one stop/start cycle.
    ///
    /// Stop and start failures are reported in the returned event, not as
    /// errors. The returned event has `waited` set to zero.
    pub async fn inject_once<C>(&self, cluster: &C) -> Result<FailureEvent, InjectError>
    where
        C: Cluster + ?Sized,
    {
        let candidates = cluster
            .list_instances_of(self.service)
            .await
            .map_err(|source| InjectError::List {
                service: self.service,
                source,
            })?;

        let instance = candidates
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(InjectError::NoCandidates(self.service))?;

        let timestamp = SystemTime::now();
        let started_at = Instant::now();
        let event = |action, outcome| FailureEvent {
            instance,
            action,
            outcome,
            timestamp,
            started_at,
            waited: Duration::ZERO,
        };

        tracing::warn!(
            "Injecting failure: stopping {} ({} candidates)",
            instance,
            candidates.len()
        );
        if let Err(e) = cluster.stop(&instance).await {
            tracing::warn!("Failed to stop {}: {}", instance, e);
            return Ok(event(FailureAction::Stop, FailureOutcome::Error(e.to_string())));
        }

        if !self.downtime.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.downtime) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("Downtime for {} cut short by shutdown", instance);
                }
            }
        }

        match cluster.start(&instance).await {
            Ok(()) => {
                tracing::info!("Restarted {} after {:?}", instance, started_at.elapsed());
                Ok(event(FailureAction::Start, FailureOutcome::Success))
            }
            Err(e) => {
                tracing::warn!("Failed to restart {}: {}", instance, e);
                Ok(event(FailureAction::Start, FailureOutcome::Error(e.to_string())))
            }
        }
    }
}

/// Restart a stranded instance, logging the outcome.
pub(crate) async fn restart<C>(cluster: &C, instance: &InstanceId) -> Result<(), ClusterError>
where
    C: Cluster + ?Sized,
{
    match cluster.start(instance).await {
        Ok(()) => {
            tracing::info!("Recovered stranded instance {}", instance);
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Stranded instance {} still not restartable: {}", instance, e);
            Err(e)
        }
    }
}
