//! Buffer Pool Module
//!
//! A process-wide pool of reusable byte buffers shared by every connection on
//! both links. Buffers are handed out as [`BufferLease`]s which return
//! themselves to the pool when dropped.

pub mod pool;

// Re-export commonly used types
pub use pool::{BufferLease, BufferPool, PoolStats, DEFAULT_BUFFER_SIZE, DEFAULT_POOL_CAPACITY};
