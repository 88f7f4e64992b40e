//! Link counters.
//!
//! Every message that enters a socket ends up in exactly one bucket: written
//! to the wire, dropped at the high water mark, lost with a failed write, or
//! still queued. Received messages are counted separately.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters updated by the socket and its connection driver.
#[derive(Debug, Default)]
pub struct LinkStats {
    queued: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    lost: AtomicU64,
    received: AtomicU64,
}

impl LinkStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self, n: u64) {
        self.written.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_lost(&self, n: u64) {
        self.lost.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// Messages accepted into the outbound queue.
    pub queued: u64,
    /// Messages fully written to a connection.
    pub written: u64,
    /// Messages discarded by `OverflowPolicy::Drop` at the high water mark.
    pub dropped: u64,
    /// Messages lost because their write failed or their peer left.
    pub lost: u64,
    /// Messages handed to the application queue.
    pub received: u64,
}

impl LinkSnapshot {
    /// Messages accepted but neither written nor lost yet.
    pub fn in_queue(&self) -> u64 {
        self.queued.saturating_sub(self.written + self.lost)
    }
}
