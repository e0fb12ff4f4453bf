//! Random mix of create/read/delete/list.

use super::{key_name, LoadContext, LoadGenerator, OpSummary};
use crate::error::LoadError;
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const PREFIX: &str = "random";

/// Keys kept around for later reads and deletes.
const MAX_LIVE_KEYS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Create,
    Read,
    Delete,
    List,
}

/// Picks one of create, read, delete or list uniformly per call.
///
/// Keys this generator created are tracked in a live set. Reads and deletes
/// take a key out of the set for the duration of the call, so two workers
/// never race on the same key.
#[derive(Debug, Default)]
pub struct RandomLoad {
    next_index: AtomicU64,
    live: Mutex<Vec<u64>>,
}

impl RandomLoad {
    /// Create the generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked.
    pub fn live_keys(&self) -> usize {
        self.lock_live().len()
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, Vec<u64>> {
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_live(&self) -> Option<u64> {
        let mut live = self.lock_live();
        if live.is_empty() {
            return None;
        }
        let slot = rand::thread_rng().gen_range(0..live.len());
        Some(live.swap_remove(slot))
    }

    fn put_live(&self, index: u64) -> bool {
        let mut live = self.lock_live();
        if live.len() >= MAX_LIVE_KEYS {
            return false;
        }
        live.push(index);
        true
    }

    async fn create(&self, ctx: &LoadContext, buf: &mut Vec<u8>) -> Result<OpSummary, LoadError> {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let key = key_name(PREFIX, index);

        let written = ctx.write_indexed(&key, index, buf).await?;
        let read = ctx.read_verified(&key, index, buf).await?;
        let mut summary = OpSummary {
            operations: 2,
            bytes_written: written,
            bytes_read: read,
        };

        if !self.put_live(index) {
            ctx.store.delete(&ctx.volume, &key).await?;
            summary.operations += 1;
        }
        Ok(summary)
    }

    async fn read(
        &self,
        ctx: &LoadContext,
        index: u64,
        buf: &mut Vec<u8>,
    ) -> Result<OpSummary, LoadError> {
        let key = key_name(PREFIX, index);
        let result = ctx.read_verified(&key, index, buf).await;
        self.put_live(index);
        Ok(OpSummary {
            operations: 1,
            bytes_read: result?,
            ..Default::default()
        })
    }

    async fn delete(&self, ctx: &LoadContext, index: u64) -> Result<OpSummary, LoadError> {
        let key = key_name(PREFIX, index);
        if let Err(e) = ctx.store.delete(&ctx.volume, &key).await {
            // still exists as far as we know
            self.put_live(index);
            return Err(e.into());
        }
        Ok(OpSummary {
            operations: 1,
            ..Default::default()
        })
    }

    async fn list(&self, ctx: &LoadContext) -> Result<OpSummary, LoadError> {
        let prefix = format!("{}/", PREFIX);
        let keys = ctx.store.list(&ctx.volume, &prefix).await?;
        tracing::trace!("random: listed {} keys", keys.len());
        Ok(OpSummary {
            operations: 1,
            ..Default::default()
        })
    }
}

#[async_trait]
impl LoadGenerator for RandomLoad {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn generate(&self, ctx: &LoadContext, buf: &mut Vec<u8>) -> Result<OpSummary, LoadError> {
        let op = match rand::thread_rng().gen_range(0..4) {
            0 => Op::Create,
            1 => Op::Read,
            2 => Op::Delete,
            _ => Op::List,
        };

        match op {
            Op::Create => self.create(ctx, buf).await,
            Op::Read => match self.take_live() {
                Some(index) => self.read(ctx, index, buf).await,
                None => self.create(ctx, buf).await,
            },
            Op::Delete => match self.take_live() {
                Some(index) => self.delete(ctx, index).await,
                None => self.create(ctx, buf).await,
            },
            Op::List => self.list(ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use chaos_cluster::{Cluster, InstanceId, ServiceType};

    #[tokio::test]
    async fn healthy_cluster_never_fails() {
        let (_cluster, ctx) = context(32, 256).await;
        let generator = RandomLoad::new();
        let mut buf = Vec::new();

        for _ in 0..500 {
            generator.generate(&ctx, &mut buf).await.unwrap();
        }
    }

    #[tokio::test]
    async fn created_keys_are_tracked_and_stored() {
        let (cluster, ctx) = context(8, 8).await;
        let generator = RandomLoad::new();
        let mut buf = Vec::new();

        let summary = generator.create(&ctx, &mut buf).await.unwrap();
        assert_eq!(summary.operations, 2);
        assert_eq!(summary.bytes_written, 8);
        assert_eq!(summary.bytes_read, 8);
        assert_eq!(generator.live_keys(), 1);
        assert_eq!(cluster.object_count("vol"), 1);
    }

    #[tokio::test]
    async fn delete_removes_key_from_store_and_tracking() {
        let (cluster, ctx) = context(8, 8).await;
        let generator = RandomLoad::new();
        let mut buf = Vec::new();
        generator.create(&ctx, &mut buf).await.unwrap();

        let index = generator.take_live().unwrap();
        generator.delete(&ctx, index).await.unwrap();

        assert_eq!(generator.live_keys(), 0);
        assert_eq!(cluster.object_count("vol"), 0);
    }

    #[tokio::test]
    async fn failed_delete_keeps_key_tracked() {
        let (cluster, ctx) = context(8, 8).await;
        let generator = RandomLoad::new();
        let mut buf = Vec::new();
        generator.create(&ctx, &mut buf).await.unwrap();

        cluster.fail_next_op("manager restarting");
        let index = generator.take_live().unwrap();
        let err = generator.delete(&ctx, index).await.unwrap_err();

        assert!(!err.is_fatal());
        assert_eq!(generator.live_keys(), 1);
    }

    #[tokio::test]
    async fn reads_survive_single_node_outage() {
        let (cluster, ctx) = context(8, 64).await;
        let generator = RandomLoad::new();
        let mut buf = Vec::new();
        generator.create(&ctx, &mut buf).await.unwrap();

        cluster
            .stop(&InstanceId::new(ServiceType::StorageNode, 1))
            .await
            .unwrap();

        let index = generator.take_live().unwrap();
        generator.read(&ctx, index, &mut buf).await.unwrap();
        assert_eq!(generator.live_keys(), 1);

        // writes need every replica in a 3-node cluster
        let err = generator.create(&ctx, &mut buf).await.unwrap_err();
        assert!(matches!(err, LoadError::Operation(_)));
    }
}
