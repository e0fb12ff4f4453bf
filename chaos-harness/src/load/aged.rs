//! Write keys now, read them back much later.

use super::{key_name, LoadContext, LoadGenerator, OpSummary};
use crate::error::LoadError;
use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const PREFIX: &str = "aged";

/// Half writes, half reads of keys written earlier in the run.
///
/// Written keys go into a rolling record capped at `retention` entries. Keys
/// that fall off the record stay in the store; they are just no longer read.
/// Data that has sat through many restarts is what this generator exercises.
#[derive(Debug)]
pub struct AgedLoad {
    retention: usize,
    next_index: AtomicU64,
    record: Mutex<VecDeque<u64>>,
}

impl AgedLoad {
    /// Generator remembering up to `retention` keys (at least one).
    pub fn new(retention: usize) -> Self {
        let retention = retention.max(1);
        Self {
            retention,
            next_index: AtomicU64::new(0),
            record: Mutex::new(VecDeque::with_capacity(retention.min(4096))),
        }
    }

    /// Keys currently eligible for reading.
    pub fn recorded(&self) -> usize {
        self.lock_record().len()
    }

    fn lock_record(&self) -> MutexGuard<'_, VecDeque<u64>> {
        self.record
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remember(&self, index: u64) {
        let mut record = self.lock_record();
        record.push_back(index);
        while record.len() > self.retention {
            record.pop_front();
        }
    }

    /// `None` means write a new key.
    fn pick(&self) -> Option<u64> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(0.5) {
            return None;
        }
        let record = self.lock_record();
        if record.is_empty() {
            return None;
        }
        record.get(rng.gen_range(0..record.len())).copied()
    }
}

#[async_trait]
impl LoadGenerator for AgedLoad {
    fn name(&self) -> &'static str {
        "aged"
    }

    async fn generate(&self, ctx: &LoadContext, buf: &mut Vec<u8>) -> Result<OpSummary, LoadError> {
        match self.pick() {
            Some(index) => {
                let read = ctx
                    .read_verified(&key_name(PREFIX, index), index, buf)
                    .await?;
                Ok(OpSummary {
                    operations: 1,
                    bytes_read: read,
                    ..Default::default()
                })
            }
            None => {
                let index = self.next_index.fetch_add(1, Ordering::Relaxed);
                let written = ctx
                    .write_indexed(&key_name(PREFIX, index), index, buf)
                    .await?;
                self.remember(index);
                Ok(OpSummary {
                    operations: 1,
                    bytes_written: written,
                    ..Default::default()
                })
            }
        }
    }
}
