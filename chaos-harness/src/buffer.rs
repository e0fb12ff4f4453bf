//! Shared I/O buffer pool.
//!
//! A fixed set of reusable byte buffers shared by every load worker:
//! - at most `capacity` buffers are checked out at any instant
//! - checkout waits (per worker) when the pool is exhausted, which throttles
//!   workers to the pool size
//! - a checked-out buffer is a [`PooledBuffer`] guard that goes back to the
//!   pool when dropped, on success, error, or panic alike
//!
//! The free list is guarded by a tokio [`Semaphore`] holding one permit per
//! buffer, so the free list is never empty when a permit is held.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error type for buffer checkout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// No buffer was returned within the allowed wait.
    #[error("no buffer available after {waited:?}")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },
    /// The pool was closed.
    #[error("buffer pool closed")]
    Closed,
}

#[derive(Debug)]
struct PoolShared {
    permits: Arc<Semaphore>,
    free: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
    buffer_size: usize,
    in_use: AtomicUsize,
    peak_in_use: AtomicUsize,
    checkouts: AtomicU64,
    returns: AtomicU64,
}

impl PoolShared {
    fn give_back(&self, mut buf: Vec<u8>) {
        buf.clear();
        self.free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(buf);
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        self.returns.fetch_add(1, Ordering::Relaxed);
    }
}

/// Bounded pool of reusable byte buffers. Cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create a pool of `capacity` buffers, each preallocated to `buffer_size` bytes.
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        let free = (0..capacity)
            .map(|_| Vec::with_capacity(buffer_size))
            .collect();
        Self {
            shared: Arc::new(PoolShared {
                permits: Arc::new(Semaphore::new(capacity)),
                free: Mutex::new(free),
                capacity,
                buffer_size,
                in_use: AtomicUsize::new(0),
                peak_in_use: AtomicUsize::new(0),
                checkouts: AtomicU64::new(0),
                returns: AtomicU64::new(0),
            }),
        }
    }

    /// Check out a buffer, waiting as long as it takes.
    pub async fn checkout(&self) -> Result<PooledBuffer, PoolError> {
        let permit = Arc::clone(&self.shared.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        Ok(self.take(permit))
    }

    /// Check out a buffer, giving up after `timeout`.
    pub async fn checkout_timeout(&self, timeout: Duration) -> Result<PooledBuffer, PoolError> {
        match tokio::time::timeout(timeout, self.checkout()).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Timeout { waited: timeout }),
        }
    }

    /// Check out a buffer only if one is free right now.
    pub fn try_checkout(&self) -> Option<PooledBuffer> {
        let permit = Arc::clone(&self.shared.permits).try_acquire_owned().ok()?;
        Some(self.take(permit))
    }

    /// Close the pool. Waiting and future checkouts fail with [`PoolError::Closed`];
    /// buffers already checked out can still be returned.
    pub fn close(&self) {
        self.shared.permits.close();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.permits.is_closed()
    }

    /// Total number of buffers.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Preallocated size of each buffer.
    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size
    }

    /// Buffers currently checked out.
    pub fn in_use(&self) -> usize {
        self.shared.in_use.load(Ordering::Acquire)
    }

    /// Highest number of buffers checked out at once.
    pub fn peak_in_use(&self) -> usize {
        self.shared.peak_in_use.load(Ordering::Acquire)
    }

    /// Total successful checkouts.
    pub fn checkouts(&self) -> u64 {
        self.shared.checkouts.load(Ordering::Relaxed)
    }

    /// Total buffers returned.
    pub fn returns(&self) -> u64 {
        self.shared.returns.load(Ordering::Relaxed)
    }

    fn take(&self, permit: OwnedSemaphorePermit) -> PooledBuffer {
        let buf = self
            .shared
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.shared.buffer_size));

        let now = self.shared.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.peak_in_use.fetch_max(now, Ordering::AcqRel);
        self.shared.checkouts.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            buf,
            shared: Arc::clone(&self.shared),
            _permit: permit,
        }
    }
}

/// A buffer checked out of a [`BufferPool`]. Returned on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    shared: Arc<PoolShared>,
    // Released after `buf` is back on the free list (fields drop after `Drop::drop`).
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.shared.give_back(std::mem::take(&mut self.buf));
    }
}
