//! Reconnection state with optional exponential backoff.
//!
//! A connecting DEALER keeps retrying while its peer is absent; this tracks
//! how long to wait between attempts, following libzmq's
//! `ZMQ_RECONNECT_IVL` / `ZMQ_RECONNECT_IVL_MAX` semantics.

use crate::options::SocketOptions;
use std::time::Duration;

/// Reconnection state tracker.
///
/// # Example
///
/// ```rust
/// use lossprobe_core::reconnect::ReconnectState;
/// use lossprobe_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let options = SocketOptions::default()
///     .with_reconnect_ivl(Duration::from_millis(100))
///     .with_reconnect_ivl_max(Duration::from_secs(10));
///
/// let mut reconnect = ReconnectState::new(&options);
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(200));
///
/// reconnect.reset();
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    base_interval: Duration,
    max_interval: Duration,
    attempt: u32,
}

impl ReconnectState {
    /// Create a new reconnection state tracker from socket options.
    pub const fn new(options: &SocketOptions) -> Self {
        Self {
            base_interval: options.reconnect_ivl,
            max_interval: options.reconnect_ivl_max,
            attempt: 0,
        }
    }

    /// Get the delay before the next attempt and count the attempt.
    ///
    /// Without a maximum interval every attempt waits the base interval.
    pub fn next_delay(&mut self) -> Duration {
        let delay = if self.max_interval.is_zero() {
            self.base_interval
        } else {
            // 2^10 is plenty; the cap kicks in long before.
            let factor = 1_u32 << self.attempt.min(10);
            self.base_interval.saturating_mul(factor).min(self.max_interval)
        };
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of failed attempts since the last reset.
    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}
