//! In-memory mini cluster.
//!
//! Implements [`Cluster`] and [`ObjectStore`] over process-local state so the
//! harness can be exercised without a real deployment. Availability follows
//! two rules:
//!
//! - every object operation needs a majority of metadata managers running
//! - writes need `replication` running storage nodes; reads need at least one
//!   running replica of the key
//!
//! Each replica lands on one data volume (disk) of its node, picked at random.
//!
//! Stopping instances therefore shows up as operation errors, which is all the
//! harness needs to observe. Test hooks in the style of a mock transport allow
//! forcing the next stop/start/operation to fail.

use crate::error::ClusterError;
use crate::ids::{InstanceId, ServiceType};
use crate::{Cluster, ObjectStore};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Operation counters for a [`MiniCluster`].
#[derive(Debug, Default)]
pub struct MiniClusterMetrics {
    /// Successful instance stops.
    pub stops_total: AtomicU64,
    /// Successful instance starts of stopped instances.
    pub starts_total: AtomicU64,
    /// Object operations attempted.
    pub operations_total: AtomicU64,
    /// Object operations that returned an error.
    pub operations_failed: AtomicU64,
}

/// Builder for [`MiniCluster`].
#[derive(Debug, Clone)]
pub struct MiniClusterBuilder {
    storage_nodes: usize,
    metadata_managers: usize,
    data_volumes: usize,
    replication: usize,
    op_latency: Duration,
    ready_poll_interval: Duration,
}

impl Default for MiniClusterBuilder {
    fn default() -> Self {
        Self {
            storage_nodes: 3,
            metadata_managers: 1,
            data_volumes: 3,
            replication: 3,
            op_latency: Duration::ZERO,
            ready_poll_interval: Duration::from_millis(50),
        }
    }
}

impl MiniClusterBuilder {
    /// Number of storage node instances.
    pub fn storage_nodes(mut self, n: usize) -> Self {
        self.storage_nodes = n;
        self
    }

    /// Number of metadata manager instances.
    pub fn metadata_managers(mut self, n: usize) -> Self {
        self.metadata_managers = n;
        self
    }

    /// Data volumes (disks) per storage node. Replicas are spread across
    /// them; zero is treated as one.
    pub fn data_volumes(mut self, n: usize) -> Self {
        self.data_volumes = n;
        self
    }

    /// Replicas per object. Capped at the number of storage nodes.
    pub fn replication(mut self, n: usize) -> Self {
        self.replication = n;
        self
    }

    /// Simulated latency added to every object operation.
    pub fn op_latency(mut self, latency: Duration) -> Self {
        self.op_latency = latency;
        self
    }

    /// How often `wait_ready` re-checks instance state.
    pub fn ready_poll_interval(mut self, interval: Duration) -> Self {
        self.ready_poll_interval = interval;
        self
    }

    /// Build the cluster with every instance running.
    pub fn build(self) -> MiniCluster {
        let mut instances = BTreeMap::new();
        for i in 0..self.storage_nodes {
            instances.insert(
                InstanceId::new(ServiceType::StorageNode, i),
                InstanceState::default(),
            );
        }
        for i in 0..self.metadata_managers {
            instances.insert(
                InstanceId::new(ServiceType::MetadataManager, i),
                InstanceState::default(),
            );
        }

        tracing::debug!(
            "Mini cluster built: {} storage nodes x {} data volumes, {} metadata managers, replication {}",
            self.storage_nodes,
            self.data_volumes,
            self.metadata_managers,
            self.replication
        );

        MiniCluster {
            inner: Arc::new(MiniClusterInner {
                faults: Mutex::new(Faults {
                    op_latency: self.op_latency,
                    ..Default::default()
                }),
                settings: self,
                instances: Mutex::new(instances),
                volumes: DashMap::new(),
                shut_down: AtomicBool::new(false),
                metrics: MiniClusterMetrics::default(),
            }),
        }
    }
}

#[derive(Debug)]
struct InstanceState {
    running: bool,
    restarts: u64,
}

impl Default for InstanceState {
    fn default() -> Self {
        Self {
            running: true,
            restarts: 0,
        }
    }
}

/// Where one replica lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Replica {
    node: usize,
    disk: usize,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    replicas: Vec<Replica>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_stop: Option<String>,
    fail_next_start: Option<String>,
    fail_next_op: Option<String>,
    op_latency: Duration,
}

#[derive(Debug)]
struct MiniClusterInner {
    settings: MiniClusterBuilder,
    instances: Mutex<BTreeMap<InstanceId, InstanceState>>,
    volumes: DashMap<String, BTreeMap<String, StoredObject>>,
    faults: Mutex<Faults>,
    shut_down: AtomicBool,
    metrics: MiniClusterMetrics,
}

/// In-memory cluster. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct MiniCluster {
    inner: Arc<MiniClusterInner>,
}

impl MiniCluster {
    /// Start building a mini cluster.
    pub fn builder() -> MiniClusterBuilder {
        MiniClusterBuilder::default()
    }

    /// Data volumes per storage node.
    pub fn data_volumes_per_node(&self) -> usize {
        self.inner.settings.data_volumes.max(1)
    }

    /// Replicas held on each data volume of storage node `node`, across all
    /// volumes. Empty for an unknown node.
    pub fn data_volume_usage(&self, node: usize) -> Vec<usize> {
        if node >= self.inner.settings.storage_nodes {
            return Vec::new();
        }
        let mut usage = vec![0; self.data_volumes_per_node()];
        for objects in self.inner.volumes.iter() {
            for object in objects.values() {
                for replica in object.replicas.iter().filter(|r| r.node == node) {
                    usage[replica.disk] += 1;
                }
            }
        }
        usage
    }

    /// Operation counters.
    pub fn metrics(&self) -> &MiniClusterMetrics {
        &self.inner.metrics
    }

    /// Whether an instance is currently running.
    pub fn is_running(&self, instance: &InstanceId) -> bool {
        self.instances()
            .get(instance)
            .map(|s| s.running)
            .unwrap_or(false)
    }

    /// Number of running instances of a service type.
    pub fn running_count(&self, service: ServiceType) -> usize {
        self.instances()
            .iter()
            .filter(|(id, s)| id.service() == service && s.running)
            .count()
    }

    /// Number of times an instance has been restarted.
    pub fn restarts(&self, instance: &InstanceId) -> u64 {
        self.instances()
            .get(instance)
            .map(|s| s.restarts)
            .unwrap_or(0)
    }

    /// Number of objects stored in a volume.
    pub fn object_count(&self, volume: &str) -> usize {
        self.inner.volumes.get(volume).map(|v| v.len()).unwrap_or(0)
    }

    /// Cause the next `stop()` to fail with the given error.
    pub fn fail_next_stop(&self, error: &str) {
        self.faults().fail_next_stop = Some(error.to_string());
    }

    /// Cause the next `start()` to fail with the given error.
    pub fn fail_next_start(&self, error: &str) {
        self.faults().fail_next_start = Some(error.to_string());
    }

    /// Cause the next object operation to fail with the given error.
    pub fn fail_next_op(&self, error: &str) {
        self.faults().fail_next_op = Some(error.to_string());
    }

    /// Change the simulated latency of object operations.
    pub fn set_op_latency(&self, latency: Duration) {
        self.faults().op_latency = latency;
    }

    fn instances(&self) -> MutexGuard<'_, BTreeMap<InstanceId, InstanceState>> {
        self.inner
            .instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_open(&self) -> Result<(), ClusterError> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(ClusterError::Shutdown);
        }
        Ok(())
    }

    fn replication(&self) -> usize {
        self.inner
            .settings
            .replication
            .clamp(1, self.inner.settings.storage_nodes.max(1))
    }

    fn is_ready(&self) -> bool {
        let instances = self.instances();
        !instances.is_empty() && instances.values().all(|s| s.running)
    }

    /// Common preamble of every object operation: latency, injected fault,
    /// manager quorum.
    async fn begin_op(&self) -> Result<(), ClusterError> {
        self.inner
            .metrics
            .operations_total
            .fetch_add(1, Ordering::Relaxed);

        let latency = self.faults().op_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.check_open()?;

        if let Some(error) = self.faults().fail_next_op.take() {
            return Err(ClusterError::Injected(error));
        }

        let total = self.inner.settings.metadata_managers;
        let running = self.running_count(ServiceType::MetadataManager);
        if running * 2 <= total {
            return Err(ClusterError::unavailable(format!(
                "{} of {} metadata managers running, no quorum",
                running, total
            )));
        }
        Ok(())
    }

    fn record<T>(&self, result: Result<T, ClusterError>) -> Result<T, ClusterError> {
        if result.is_err() {
            self.inner
                .metrics
                .operations_failed
                .fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn running_storage_nodes(&self) -> Vec<usize> {
        self.instances()
            .iter()
            .filter(|(id, s)| id.service() == ServiceType::StorageNode && s.running)
            .map(|(id, _)| id.index())
            .collect()
    }

    async fn do_create(&self, volume: &str, key: &str, data: &[u8]) -> Result<(), ClusterError> {
        self.begin_op().await?;

        let needed = self.replication();
        let running = self.running_storage_nodes();
        if running.len() < needed {
            return Err(ClusterError::unavailable(format!(
                "{} storage nodes running, write needs {}",
                running.len(),
                needed
            )));
        }
        let disks = self.data_volumes_per_node();
        let replicas: Vec<Replica> = {
            let mut rng = rand::thread_rng();
            running
                .choose_multiple(&mut rng, needed)
                .map(|&node| Replica {
                    node,
                    disk: rng.gen_range(0..disks),
                })
                .collect()
        };

        let mut objects = self
            .inner
            .volumes
            .get_mut(volume)
            .ok_or_else(|| ClusterError::VolumeNotFound(volume.to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                replicas,
            },
        );
        Ok(())
    }

    async fn do_read(&self, volume: &str, key: &str) -> Result<Vec<u8>, ClusterError> {
        self.begin_op().await?;

        let object = {
            let objects = self
                .inner
                .volumes
                .get(volume)
                .ok_or_else(|| ClusterError::VolumeNotFound(volume.to_string()))?;
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| ClusterError::KeyNotFound {
                    volume: volume.to_string(),
                    key: key.to_string(),
                })?
        };

        let running = self.running_storage_nodes();
        if !object.replicas.iter().any(|r| running.contains(&r.node)) {
            return Err(ClusterError::unavailable(format!(
                "no running replica for {}/{}",
                volume, key
            )));
        }
        Ok(object.data)
    }

    async fn do_delete(&self, volume: &str, key: &str) -> Result<(), ClusterError> {
        self.begin_op().await?;

        let mut objects = self
            .inner
            .volumes
            .get_mut(volume)
            .ok_or_else(|| ClusterError::VolumeNotFound(volume.to_string()))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ClusterError::KeyNotFound {
                volume: volume.to_string(),
                key: key.to_string(),
            })
    }

    async fn do_list(&self, volume: &str, prefix: &str) -> Result<Vec<String>, ClusterError> {
        self.begin_op().await?;

        let objects = self
            .inner
            .volumes
            .get(volume)
            .ok_or_else(|| ClusterError::VolumeNotFound(volume.to_string()))?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[async_trait]
impl Cluster for MiniCluster {
    async fn list_instances_of(&self, service: ServiceType) -> Result<Vec<InstanceId>, ClusterError> {
        self.check_open()?;
        Ok(self
            .instances()
            .iter()
            .filter(|(id, s)| id.service() == service && s.running)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn stop(&self, instance: &InstanceId) -> Result<(), ClusterError> {
        self.check_open()?;

        if let Some(error) = self.faults().fail_next_stop.take() {
            return Err(ClusterError::Injected(error));
        }

        let mut instances = self.instances();
        let state = instances
            .get_mut(instance)
            .ok_or(ClusterError::UnknownInstance(*instance))?;
        if !state.running {
            return Err(ClusterError::InvalidState {
                instance: *instance,
                reason: "already stopped".into(),
            });
        }
        state.running = false;
        self.inner.metrics.stops_total.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Mini cluster: stopped {}", instance);
        Ok(())
    }

    async fn start(&self, instance: &InstanceId) -> Result<(), ClusterError> {
        self.check_open()?;

        if let Some(error) = self.faults().fail_next_start.take() {
            return Err(ClusterError::Injected(error));
        }

        let mut instances = self.instances();
        let state = instances
            .get_mut(instance)
            .ok_or(ClusterError::UnknownInstance(*instance))?;
        if !state.running {
            state.running = true;
            state.restarts += 1;
            self.inner.metrics.starts_total.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Mini cluster: started {}", instance);
        }
        Ok(())
    }

    async fn wait_ready(&self) -> Result<(), ClusterError> {
        if self.inner.settings.storage_nodes == 0 {
            return Err(ClusterError::NotReady("cluster has no storage nodes".into()));
        }
        if self.inner.settings.metadata_managers == 0 {
            return Err(ClusterError::NotReady(
                "cluster has no metadata managers".into(),
            ));
        }

        loop {
            self.check_open()?;
            if self.is_ready() {
                return Ok(());
            }
            tokio::time::sleep(self.inner.settings.ready_poll_interval).await;
        }
    }

    async fn shutdown(&self) -> Result<(), ClusterError> {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for state in self.instances().values_mut() {
            state.running = false;
        }
        tracing::debug!("Mini cluster shut down");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MiniCluster {
    async fn create_volume(&self, volume: &str) -> Result<(), ClusterError> {
        self.check_open()?;
        match self.inner.volumes.entry(volume.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ClusterError::VolumeExists(volume.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(BTreeMap::new());
                Ok(())
            }
        }
    }

    async fn create(&self, volume: &str, key: &str, data: &[u8]) -> Result<(), ClusterError> {
        let result = self.do_create(volume, key, data).await;
        self.record(result)
    }

    async fn read(&self, volume: &str, key: &str) -> Result<Vec<u8>, ClusterError> {
        let result = self.do_read(volume, key).await;
        self.record(result)
    }

    async fn delete(&self, volume: &str, key: &str) -> Result<(), ClusterError> {
        let result = self.do_delete(volume, key).await;
        self.record(result)
    }

    async fn list(&self, volume: &str, prefix: &str) -> Result<Vec<String>, ClusterError> {
        let result = self.do_list(volume, prefix).await;
        self.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(i: usize) -> InstanceId {
        InstanceId::new(ServiceType::StorageNode, i)
    }

    fn manager(i: usize) -> InstanceId {
        InstanceId::new(ServiceType::MetadataManager, i)
    }

    async fn cluster_with_volume() -> MiniCluster {
        let cluster = MiniCluster::builder().build();
        cluster.create_volume("vol").await.unwrap();
        cluster
    }

    // ===========================================
    // Instance lifecycle
    // ===========================================

    #[tokio::test]
    async fn lists_only_running_instances() {
        let cluster = MiniCluster::builder().storage_nodes(3).build();

        cluster.stop(&node(1)).await.unwrap();

        let listed = cluster.list_instances_of(ServiceType::StorageNode).await.unwrap();
        assert_eq!(listed, vec![node(0), node(2)]);

        let managers = cluster
            .list_instances_of(ServiceType::MetadataManager)
            .await
            .unwrap();
        assert_eq!(managers, vec![manager(0)]);
    }

    #[tokio::test]
    async fn stop_then_start_counts_restart() {
        let cluster = MiniCluster::builder().build();

        cluster.stop(&node(0)).await.unwrap();
        assert!(!cluster.is_running(&node(0)));

        cluster.start(&node(0)).await.unwrap();
        assert!(cluster.is_running(&node(0)));
        assert_eq!(cluster.restarts(&node(0)), 1);
        assert_eq!(cluster.metrics().stops_total.load(Ordering::Relaxed), 1);
        assert_eq!(cluster.metrics().starts_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn stopping_stopped_instance_is_rejected() {
        let cluster = MiniCluster::builder().build();
        cluster.stop(&node(0)).await.unwrap();

        let result = cluster.stop(&node(0)).await;
        assert!(matches!(result, Err(ClusterError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn starting_running_instance_is_noop() {
        let cluster = MiniCluster::builder().build();
        cluster.start(&node(0)).await.unwrap();
        assert_eq!(cluster.restarts(&node(0)), 0);
    }

    #[tokio::test]
    async fn unknown_instance_is_rejected() {
        let cluster = MiniCluster::builder().storage_nodes(1).build();
        let result = cluster.stop(&node(7)).await;
        assert_eq!(result, Err(ClusterError::UnknownInstance(node(7))));
    }

    #[tokio::test]
    async fn injected_stop_and_start_faults_fire_once() {
        let cluster = MiniCluster::builder().build();

        cluster.fail_next_stop("boom");
        assert_eq!(
            cluster.stop(&node(0)).await,
            Err(ClusterError::Injected("boom".into()))
        );
        cluster.stop(&node(0)).await.unwrap();

        cluster.fail_next_start("bang");
        assert_eq!(
            cluster.start(&node(0)).await,
            Err(ClusterError::Injected("bang".into()))
        );
        cluster.start(&node(0)).await.unwrap();
    }

    // ===========================================
    // Readiness and shutdown
    // ===========================================

    #[tokio::test]
    async fn wait_ready_returns_when_all_running() {
        let cluster = MiniCluster::builder().build();
        cluster.wait_ready().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wait_ready_blocks_until_restart() {
        let cluster = MiniCluster::builder().build();
        cluster.stop(&node(2)).await.unwrap();

        let restarter = cluster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            restarter.start(&node(2)).await.unwrap();
        });

        tokio::time::timeout(Duration::from_secs(5), cluster.wait_ready())
            .await
            .expect("cluster should become ready")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_ready_fails_without_managers() {
        let cluster = MiniCluster::builder().metadata_managers(0).build();
        assert!(matches!(
            cluster.wait_ready().await,
            Err(ClusterError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_closes_cluster() {
        let cluster = cluster_with_volume().await;
        cluster.shutdown().await.unwrap();
        cluster.shutdown().await.unwrap();

        assert_eq!(cluster.running_count(ServiceType::StorageNode), 0);
        assert_eq!(
            cluster.list_instances_of(ServiceType::StorageNode).await,
            Err(ClusterError::Shutdown)
        );
        assert_eq!(
            cluster.read("vol", "k").await,
            Err(ClusterError::Shutdown)
        );
    }

    // ===========================================
    // Object store
    // ===========================================

    #[tokio::test]
    async fn create_read_delete_roundtrip() {
        let cluster = cluster_with_volume().await;

        cluster.create("vol", "a", b"hello").await.unwrap();
        assert_eq!(cluster.read("vol", "a").await.unwrap(), b"hello");

        cluster.delete("vol", "a").await.unwrap();
        assert!(matches!(
            cluster.read("vol", "a").await,
            Err(ClusterError::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let cluster = cluster_with_volume().await;
        for key in ["dir/a", "dir/b", "dir2/c", "other"] {
            cluster.create("vol", key, b"x").await.unwrap();
        }

        let listed = cluster.list("vol", "dir/").await.unwrap();
        assert_eq!(listed, vec!["dir/a".to_string(), "dir/b".to_string()]);
        assert_eq!(cluster.object_count("vol"), 4);
    }

    #[tokio::test]
    async fn duplicate_volume_rejected() {
        let cluster = cluster_with_volume().await;
        assert_eq!(
            cluster.create_volume("vol").await,
            Err(ClusterError::VolumeExists("vol".into()))
        );
        assert!(matches!(
            cluster.create("missing", "k", b"x").await,
            Err(ClusterError::VolumeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn writes_need_full_replication() {
        let cluster = cluster_with_volume().await;
        cluster.create("vol", "before", b"data").await.unwrap();

        cluster.stop(&node(0)).await.unwrap();

        // 2 of 3 nodes: writes fail, reads still find a replica
        assert!(matches!(
            cluster.create("vol", "during", b"data").await,
            Err(ClusterError::Unavailable { .. })
        ));
        assert_eq!(cluster.read("vol", "before").await.unwrap(), b"data");

        cluster.start(&node(0)).await.unwrap();
        cluster.create("vol", "after", b"data").await.unwrap();
        assert_eq!(cluster.metrics().operations_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn reads_fail_when_every_replica_down() {
        let cluster = MiniCluster::builder().storage_nodes(2).replication(1).build();
        cluster.create_volume("vol").await.unwrap();
        cluster.create("vol", "k", b"v").await.unwrap();

        cluster.stop(&node(0)).await.unwrap();
        cluster.stop(&node(1)).await.unwrap();

        assert!(matches!(
            cluster.read("vol", "k").await,
            Err(ClusterError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn operations_need_manager_quorum() {
        let cluster = MiniCluster::builder().metadata_managers(3).build();
        cluster.create_volume("vol").await.unwrap();

        cluster.stop(&manager(0)).await.unwrap();
        cluster.create("vol", "k", b"v").await.unwrap();

        cluster.stop(&manager(1)).await.unwrap();
        assert!(matches!(
            cluster.list("vol", "").await,
            Err(ClusterError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn injected_op_fault_fires_once() {
        let cluster = cluster_with_volume().await;
        cluster.fail_next_op("disk full");

        assert_eq!(
            cluster.create("vol", "k", b"v").await,
            Err(ClusterError::Injected("disk full".into()))
        );
        cluster.create("vol", "k", b"v").await.unwrap();
    }

    #[tokio::test]
    async fn data_volumes_reported() {
        let cluster = MiniCluster::builder().data_volumes(5).build();
        assert_eq!(cluster.data_volumes_per_node(), 5);
        assert_eq!(MiniCluster::builder().data_volumes(0).build().data_volumes_per_node(), 1);
    }

    #[tokio::test]
    async fn replicas_spread_across_data_volumes() {
        let cluster = MiniCluster::builder().storage_nodes(3).data_volumes(4).build();
        cluster.create_volume("vol").await.unwrap();
        for i in 0..200 {
            cluster.create("vol", &format!("k{}", i), b"v").await.unwrap();
        }

        // replication 3 on 3 nodes puts every object on every node
        let usage = cluster.data_volume_usage(0);
        assert_eq!(usage.len(), 4);
        assert_eq!(usage.iter().sum::<usize>(), 200);
        assert!(usage.iter().all(|&n| n > 0), "unused disk: {:?}", usage);
        assert!(cluster.data_volume_usage(3).is_empty());

        cluster.delete("vol", "k0").await.unwrap();
        assert_eq!(cluster.data_volume_usage(1).iter().sum::<usize>(), 199);
    }
}
