//! Socket configuration options
//!
//! A trimmed-down take on libzmq's socket options (zmq_setsockopt): the
//! knobs that matter for a queue-then-drain DEALER socket.

use bytes::Bytes;
use std::time::Duration;

/// What `send()` does when the outbound queue has reached the send high water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait until the queue has room again (DEALER behaviour in libzmq).
    #[default]
    Block,
    /// Discard the message and count it as dropped.
    Drop,
}

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use lossprobe_core::options::SocketOptions;
///
/// // Room for 8192 queued messages in each direction
/// let opts = SocketOptions::default().with_hwm(8192 * 2);
/// assert_eq!(opts.send_hwm, 16384);
/// assert_eq!(opts.recv_hwm, 16384);
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// High water mark for sending (ZMQ_SNDHWM)
    ///
    /// Maximum number of messages queued for sending, including messages
    /// queued while no peer is connected.
    /// - Default: 1000 messages
    pub send_hwm: usize,

    /// High water mark for receiving (ZMQ_RCVHWM)
    ///
    /// Maximum number of complete messages queued for the application. When
    /// reached, the connection is not read until the application catches up.
    /// - Default: 1000 messages
    pub recv_hwm: usize,

    /// Behaviour of `send()` at the send high water mark.
    pub overflow: OverflowPolicy,

    /// Handshake timeout (ZMQ_HANDSHAKE_IVL)
    ///
    /// Maximum time to complete the ZMTP handshake after connecting.
    /// - Default: 30 seconds
    /// - `Duration::ZERO` disables the timeout
    pub handshake_timeout: Duration,

    /// Linger timeout (ZMQ_LINGER)
    ///
    /// Time `close()` waits for queued messages to be written.
    /// - `None`: Wait indefinitely
    /// - `Some(Duration::ZERO)`: Discard queued messages immediately
    /// - `Some(duration)`: Wait up to duration
    pub linger: Option<Duration>,

    /// Reconnect interval (ZMQ_RECONNECT_IVL)
    ///
    /// Delay between connection attempts while the peer is unavailable.
    /// - Default: 100ms
    pub reconnect_ivl: Duration,

    /// Maximum reconnect interval (ZMQ_RECONNECT_IVL_MAX)
    ///
    /// - Default: 0 (no backoff, always use `reconnect_ivl`)
    /// - When > 0: doubles `reconnect_ivl` per attempt up to this value
    pub reconnect_ivl_max: Duration,

    /// Maximum frame size (ZMQ_MAXMSGSIZE)
    ///
    /// - `None`: No limit (default)
    /// - `Some(size)`: Drop the connection when a larger frame arrives
    pub max_msg_size: Option<usize>,

    /// Read buffer size (bytes)
    ///
    /// Capacity of each buffer handed to the kernel for reading.
    pub read_buffer_size: usize,

    /// Write buffer size (bytes)
    ///
    /// Queued messages are coalesced into one write up to roughly this size.
    pub write_buffer_size: usize,

    /// Socket identity (ZMQ_ROUTING_ID)
    ///
    /// Announced to the peer in the READY command. At most 255 bytes.
    pub routing_id: Option<Bytes>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            send_hwm: 1000,
            recv_hwm: 1000,
            overflow: OverflowPolicy::Block,
            handshake_timeout: Duration::from_secs(30),
            linger: Some(Duration::from_secs(30)),
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::ZERO,
            max_msg_size: None,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            routing_id: None,
        }
    }
}

impl SocketOptions {
    /// Create new socket options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both high water marks (what `zmq_socket.set_hwm` does in pyzmq).
    pub fn with_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self.recv_hwm = hwm;
        self
    }

    /// Set send high water mark.
    pub fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self
    }

    /// Set receive high water mark.
    pub fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm;
        self
    }

    /// Set the overflow policy applied at the send high water mark.
    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Set handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set linger timeout.
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// Set reconnection interval.
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    /// Set maximum reconnection interval for exponential backoff.
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    /// Set maximum frame size.
    pub fn with_max_msg_size(mut self, size: Option<usize>) -> Self {
        self.max_msg_size = size;
        self
    }

    /// Set both read and write buffer sizes.
    pub fn with_buffer_sizes(mut self, read_size: usize, write_size: usize) -> Self {
        self.read_buffer_size = read_size;
        self.write_buffer_size = write_size;
        self
    }

    /// Set socket routing ID / identity.
    ///
    /// # Examples
    ///
    /// ```
    /// use lossprobe_core::options::SocketOptions;
    /// use bytes::Bytes;
    ///
    /// let opts = SocketOptions::new()
    ///     .with_routing_id(Bytes::from_static(b"probe-01"));
    /// assert!(opts.validate().is_ok());
    /// ```
    pub fn with_routing_id(mut self, id: Bytes) -> Self {
        self.routing_id = Some(id);
        self
    }

    /// Validate option combinations that would make the socket unusable.
    pub fn validate(&self) -> std::io::Result<()> {
        if self.send_hwm == 0 || self.recv_hwm == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "high water marks must be at least 1 message",
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "read buffer size cannot be zero",
            ));
        }
        if let Some(id) = &self.routing_id {
            Self::validate_routing_id(id)?;
        }
        Ok(())
    }

    /// Validate a routing ID for DEALER sockets.
    pub fn validate_routing_id(id: &[u8]) -> std::io::Result<()> {
        if id.len() > 255 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("routing ID cannot exceed 255 bytes (got {})", id.len()),
            ));
        }
        Ok(())
    }

    /// Get the reconnection interval for the given attempt.
    pub fn next_reconnect_ivl(&self, attempt: u32) -> Duration {
        if self.reconnect_ivl_max.is_zero() {
            return self.reconnect_ivl;
        }

        let backoff = self
            .reconnect_ivl
            .saturating_mul(2u32.saturating_pow(attempt));

        backoff.min(self.reconnect_ivl_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SocketOptions::default();
        assert_eq!(opts.send_hwm, 1000);
        assert_eq!(opts.recv_hwm, 1000);
        assert_eq!(opts.overflow, OverflowPolicy::Block);
        assert_eq!(opts.handshake_timeout, Duration::from_secs(30));
        assert_eq!(opts.reconnect_ivl, Duration::from_millis(100));
        assert!(opts.routing_id.is_none());
    }

    #[test]
    fn test_with_hwm_sets_both_directions() {
        let opts = SocketOptions::new().with_hwm(16384);
        assert_eq!(opts.send_hwm, 16384);
        assert_eq!(opts.recv_hwm, 16384);

        let opts = opts.with_send_hwm(10);
        assert_eq!(opts.send_hwm, 10);
        assert_eq!(opts.recv_hwm, 16384);
    }

    #[test]
    fn test_validate_rejects_zero_hwm() {
        assert!(SocketOptions::new().with_send_hwm(0).validate().is_err());
        assert!(SocketOptions::new().with_recv_hwm(0).validate().is_err());
        assert!(SocketOptions::new().validate().is_ok());
    }

    #[test]
    fn test_routing_id_validation() {
        assert!(SocketOptions::validate_routing_id(b"").is_ok());
        assert!(SocketOptions::validate_routing_id(&[0x00; 255]).is_ok());
        assert!(SocketOptions::validate_routing_id(&[0x01; 256]).is_err());

        let opts = SocketOptions::new().with_routing_id(Bytes::from(vec![b'x'; 300]));
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_exponential_backoff() {
        let opts = SocketOptions::new()
            .with_reconnect_ivl(Duration::from_millis(100))
            .with_reconnect_ivl_max(Duration::from_secs(10));

        assert_eq!(opts.next_reconnect_ivl(0), Duration::from_millis(100));
        assert_eq!(opts.next_reconnect_ivl(1), Duration::from_millis(200));
        assert_eq!(opts.next_reconnect_ivl(2), Duration::from_millis(400));
        assert_eq!(opts.next_reconnect_ivl(10), Duration::from_secs(10));
    }

    #[test]
    fn test_no_exponential_backoff() {
        let opts = SocketOptions::new().with_reconnect_ivl(Duration::from_millis(100));

        assert_eq!(opts.next_reconnect_ivl(0), Duration::from_millis(100));
        assert_eq!(opts.next_reconnect_ivl(10), Duration::from_millis(100));
    }
}
