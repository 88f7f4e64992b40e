//! Socket event monitoring.
//!
//! The connection driver reports lifecycle changes on a channel so that
//! callers (and tests) can observe when a peer shows up or goes away without
//! touching the data path. Monitoring is opt-in: until someone subscribes,
//! events are dropped where they are raised.

use crate::endpoint::Endpoint;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Socket lifecycle events.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Outbound connection established and handshake complete.
    Connected(Endpoint),

    /// A connection attempt failed; the driver will retry after `delay_ms`.
    ConnectRetried {
        endpoint: Endpoint,
        reason: String,
        delay_ms: u64,
    },

    /// Listener bound.
    Bound(Endpoint),

    /// Inbound connection accepted and handshake complete.
    Accepted(Endpoint),

    /// Handshake with a peer failed; the connection was dropped.
    HandshakeFailed {
        endpoint: Endpoint,
        reason: String,
    },

    /// The peer went away.
    Disconnected(Endpoint),
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(ep) => write!(f, "Connected to {ep}"),
            Self::ConnectRetried {
                endpoint,
                reason,
                delay_ms,
            } => write!(f, "Connect to {endpoint} failed ({reason}), retrying in {delay_ms}ms"),
            Self::Bound(ep) => write!(f, "Bound to {ep}"),
            Self::Accepted(ep) => write!(f, "Accepted connection on {ep}"),
            Self::HandshakeFailed { endpoint, reason } => {
                write!(f, "Handshake failed on {endpoint}: {reason}")
            }
            Self::Disconnected(ep) => write!(f, "Disconnected from {ep}"),
        }
    }
}

/// Handle for receiving socket events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Sender side used by socket implementations.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}

/// Where a socket and its driver publish events.
///
/// Clones share one subscription. Emitting without a subscriber, or after
/// the subscriber dropped its [`SocketMonitor`], does nothing.
#[derive(Debug, Clone, Default)]
pub struct EventSlot(Rc<RefCell<Option<SocketEventSender>>>);

impl EventSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving events, replacing any earlier subscriber.
    pub fn subscribe(&self) -> SocketMonitor {
        let (sender, receiver) = create_monitor();
        *self.0.borrow_mut() = Some(sender);
        receiver
    }

    pub fn is_subscribed(&self) -> bool {
        self.0.borrow().is_some()
    }

    pub fn emit(&self, event: SocketEvent) {
        let mut slot = self.0.borrow_mut();
        if let Some(sender) = slot.as_ref() {
            if sender.send(event).is_err() {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_socket_event_display() {
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let event = SocketEvent::Connected(Endpoint::Tcp(addr));
        assert_eq!(event.to_string(), "Connected to tcp://127.0.0.1:5555");

        let event = SocketEvent::ConnectRetried {
            endpoint: Endpoint::Tcp(addr),
            reason: "connection refused".into(),
            delay_ms: 100,
        };
        assert_eq!(
            event.to_string(),
            "Connect to tcp://127.0.0.1:5555 failed (connection refused), retrying in 100ms"
        );
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        sender.send(SocketEvent::Disconnected(Endpoint::Tcp(addr))).unwrap();

        let event = receiver.recv().unwrap();
        assert!(matches!(event, SocketEvent::Disconnected(_)));
    }

    #[test]
    fn test_event_slot_is_opt_in() {
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let slot = EventSlot::new();
        let driver_side = slot.clone();

        // Nobody listening yet: nothing is kept.
        driver_side.emit(SocketEvent::Bound(Endpoint::Tcp(addr)));
        assert!(!slot.is_subscribed());

        let monitor = slot.subscribe();
        assert!(monitor.is_empty());
        driver_side.emit(SocketEvent::Connected(Endpoint::Tcp(addr)));
        assert!(matches!(monitor.try_recv(), Ok(SocketEvent::Connected(_))));

        drop(monitor);
        driver_side.emit(SocketEvent::Disconnected(Endpoint::Tcp(addr)));
        assert!(!slot.is_subscribed());
    }
}
