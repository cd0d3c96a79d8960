//! Pooled Frame Buffers
//!
//! Every received frame is copied into a buffer leased from a shared pool, so
//! the connection's read buffer can drop those bytes immediately. Outbound
//! messages are encoded into leased buffers too.
//!
//! ## Lease Discipline
//!
//! A [`BufferLease`] owns its buffer until it is dropped or explicitly
//! [`released`](BufferLease::release). Both paths return the buffer to the pool
//! exactly once: `release` consumes the lease, so it can neither be called twice
//! nor be followed by another access. Early returns, `?` propagation, panics
//! and task cancellation all run the same `Drop` code.
//!
//! ```text
//!  BufferPool::lease ──> BufferLease ──(moved to dispatcher)──> drop ──> pool
//!                             │                                  ▲
//!                             └───── error / cancellation ───────┘
//! ```

use object_pool::{Pool, ReusableOwned};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default initial capacity of pooled buffers (4 KB).
///
/// Most switch messages are well below this; larger frames grow the buffer,
/// which then stays grown while it circulates in the pool.
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;

/// Default number of buffers allocated up front.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Lease accounting for a pool.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Total leases handed out
    pub leased: AtomicU64,
    /// Total leases returned
    pub released: AtomicU64,
}

impl PoolStats {
    pub fn leased(&self) -> u64 {
        self.leased.load(Ordering::Acquire)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }

    /// Leases currently held somewhere.
    pub fn outstanding(&self) -> u64 {
        // Read `released` first so a concurrent release cannot make the
        // difference go negative.
        let released = self.released();
        self.leased().saturating_sub(released)
    }
}

/// A thread-safe pool of byte buffers.
///
/// Cloning is cheap; clones share the same buffers and statistics.
#[derive(Clone)]
pub struct BufferPool {
    pool: Arc<Pool<Vec<u8>>>,
    stats: Arc<PoolStats>,
    buffer_size: usize,
}

impl BufferPool {
    /// Creates a pool with the default capacity and buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a pool holding `capacity` buffers of `buffer_size` bytes each.
    ///
    /// When the pool runs dry, extra buffers are allocated on demand and join
    /// the pool once released.
    pub fn with_capacity(capacity: usize, buffer_size: usize) -> Self {
        let pool = Pool::new(capacity, move || Vec::with_capacity(buffer_size));
        Self {
            pool: Arc::new(pool),
            stats: Arc::new(PoolStats::default()),
            buffer_size,
        }
    }

    /// Leases an empty buffer.
    pub fn lease(&self) -> BufferLease {
        let buffer_size = self.buffer_size;
        let mut inner = self.pool.pull_owned(move || Vec::with_capacity(buffer_size));

        // Buffers come back in whatever state they were dropped in
        inner.clear();

        self.stats.leased.fetch_add(1, Ordering::AcqRel);
        BufferLease {
            inner,
            stats: Arc::clone(&self.stats),
        }
    }

    /// Leases a buffer holding a copy of `data`.
    pub fn lease_from(&self, data: &[u8]) -> BufferLease {
        let mut lease = self.lease();
        lease.extend_from_slice(data);
        lease
    }

    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of idle buffers currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.pool.len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.pool.len())
            .field("buffer_size", &self.buffer_size)
            .field("outstanding", &self.stats.outstanding())
            .finish()
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Returned to the pool when dropped.
pub struct BufferLease {
    inner: ReusableOwned<Vec<u8>>,
    stats: Arc<PoolStats>,
}

impl BufferLease {
    /// Returns the buffer to the pool.
    pub fn release(self) {
        drop(self);
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }
}

impl Deref for BufferLease {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for BufferLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl AsRef<[u8]> for BufferLease {
    fn as_ref(&self) -> &[u8] {
        self.inner.as_slice()
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        // `inner` goes back to the pool right after this
        self.stats.released.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for BufferLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferLease")
            .field("len", &self.inner.len())
            .field("capacity", &self.inner.capacity())
            .finish()
    }
}
