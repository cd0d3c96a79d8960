//! Per-link connection counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for one link's connections.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Connections whose receive loop is still running
    pub active_connections: AtomicU64,
    /// Connections torn down because a newer one became active
    pub preemptions: AtomicU64,
    /// Total frames received
    pub frames_received: AtomicU64,
    /// Total frames sent
    pub frames_sent: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written, headers included
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_preempted(&self) {
        self.preemptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_sent(&self, count: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_counters() {
        let stats = ConnectionStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_preempted();
        stats.connection_closed();

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 2);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(stats.preemptions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_frame_counters() {
        let stats = ConnectionStats::new();
        stats.frame_received();
        stats.bytes_read(6);
        stats.frame_sent(6);

        assert_eq!(stats.frames_received.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 6);
        assert_eq!(stats.frames_sent.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 6);
    }
}
