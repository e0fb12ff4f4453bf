//! Reads over a fixed, pre-written key set.

use super::{key_name, LoadContext, LoadGenerator, OpSummary};
use crate::error::LoadError;
use async_trait::async_trait;
use rand::Rng;

const PREFIX: &str = "read-only";

/// Writes `keys` objects once, then only ever reads them back.
#[derive(Debug)]
pub struct ReadOnlyLoad {
    keys: usize,
}

impl ReadOnlyLoad {
    /// Generator over `keys` objects (at least one).
    pub fn new(keys: usize) -> Self {
        Self { keys: keys.max(1) }
    }

    /// Size of the key set.
    pub fn keys(&self) -> usize {
        self.keys
    }
}

#[async_trait]
impl LoadGenerator for ReadOnlyLoad {
    fn name(&self) -> &'static str {
        "read-only"
    }

    async fn initialize(&self, ctx: &LoadContext) -> Result<(), LoadError> {
        let mut buf = Vec::with_capacity(ctx.payload.max_len());
        for index in 0..self.keys as u64 {
            ctx.write_indexed(&key_name(PREFIX, index), index, &mut buf)
                .await?;
        }
        tracing::debug!("read-only: seeded {} keys in {}", self.keys, ctx.volume);
        Ok(())
    }

    async fn generate(&self, ctx: &LoadContext, buf: &mut Vec<u8>) -> Result<OpSummary, LoadError> {
        let index = rand::thread_rng().gen_range(0..self.keys as u64);
        let read = ctx
            .read_verified(&key_name(PREFIX, index), index, buf)
            .await?;
        Ok(OpSummary {
            operations: 1,
            bytes_read: read,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use chaos_cluster::ClusterError;

    #[tokio::test]
    async fn initialize_seeds_every_key() {
        let (cluster, ctx) = context(4, 32).await;
        let generator = ReadOnlyLoad::new(10);

        generator.initialize(&ctx).await.unwrap();
        assert_eq!(cluster.object_count("vol"), 10);
    }

    #[tokio::test]
    async fn reads_verify_and_never_write() {
        let (cluster, ctx) = context(4, 32).await;
        let generator = ReadOnlyLoad::new(5);
        generator.initialize(&ctx).await.unwrap();

        let mut buf = Vec::new();
        for _ in 0..100 {
            let summary = generator.generate(&ctx, &mut buf).await.unwrap();
            assert_eq!(summary.bytes_written, 0);
            assert!(summary.bytes_read >= 4);
        }
        assert_eq!(cluster.object_count("vol"), 5);
    }

    #[tokio::test]
    async fn generate_before_initialize_reports_missing_key() {
        let (_cluster, ctx) = context(4, 32).await;
        let generator = ReadOnlyLoad::new(3);

        let err = generator.generate(&ctx, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Operation(ClusterError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn zero_keys_clamped_to_one() {
        assert_eq!(ReadOnlyLoad::new(0).keys(), 1);
    }
}
