//! DEALER socket.
//!
//! Sends are queued up to `send_hwm` and flushed by a background driver;
//! receives wait on a queue the driver fills, bounded by `recv_hwm`.
//! Neither side waits for the other: a batch of sends can be queued before
//! the connection exists and drained long after.

use crate::session::{DriverContext, Mode};
use crate::socket_type::SocketType;
use crate::transport::Listener;
use crate::Multipart;
use compio::runtime::Task;
use futures::{Sink, Stream};
use lossprobe_core::endpoint::Endpoint;
use lossprobe_core::monitor::{EventSlot, SocketMonitor};
use lossprobe_core::options::{OverflowPolicy, SocketOptions};
use lossprobe_core::stats::{LinkSnapshot, LinkStats};
use std::io;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// DEALER socket for asynchronous request-reply and fire-and-forget traffic.
///
/// # Example
///
/// ```rust,no_run
/// use lossprobe_core::options::SocketOptions;
/// use lossprobe_zmtp::DealerSocket;
/// use bytes::Bytes;
///
/// #[compio::main]
/// async fn main() -> std::io::Result<()> {
///     let options = SocketOptions::new().with_hwm(16384);
///     let socket = DealerSocket::connect("ipc:///tmp/lost-send", options).await?;
///
///     socket.send(vec![Bytes::from_static(b"msg")]).await?;
///     let reply = socket.recv().await?;
///     println!("{} frames", reply.len());
///     Ok(())
/// }
/// ```
pub struct DealerSocket {
    outbound: flume::Sender<Multipart>,
    inbound: flume::Receiver<Multipart>,
    options: SocketOptions,
    stats: Arc<LinkStats>,
    events: EventSlot,
    endpoint: Endpoint,
    driver: Task<()>,
}

impl DealerSocket {
    /// Connect to `endpoint` in the background.
    ///
    /// Returns as soon as the driver is spawned. Messages sent before the
    /// peer is reachable wait in the outbound queue.
    pub async fn connect(endpoint: &str, options: SocketOptions) -> io::Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        options.validate()?;
        debug!("[DEALER] Connecting to {}", endpoint);

        let (ctx, socket) = Self::wire(Mode::Connect, endpoint, options);
        Ok(socket(compio::runtime::spawn(ctx.drive_connect())))
    }

    /// Bind `endpoint` and serve one peer at a time.
    ///
    /// The listener is bound before this returns, so a bind error surfaces
    /// here rather than in the driver.
    pub async fn bind(endpoint: &str, options: SocketOptions) -> io::Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        options.validate()?;

        let (listener, local) = Listener::bind(&endpoint).await?;
        debug!("[DEALER] Bound to {}", local);

        let (ctx, socket) = Self::wire(Mode::Bind, local, options);
        Ok(socket(compio::runtime::spawn(ctx.drive_bind(listener))))
    }

    /// Build the queues shared by the socket and its driver.
    fn wire(
        mode: Mode,
        endpoint: Endpoint,
        options: SocketOptions,
    ) -> (DriverContext, impl FnOnce(Task<()>) -> Self) {
        let (outbound_tx, outbound_rx) = flume::bounded(options.send_hwm);
        let (inbound_tx, inbound_rx) = flume::bounded(options.recv_hwm);
        let events = EventSlot::new();
        let stats = Arc::new(LinkStats::new());

        let ctx = DriverContext {
            mode,
            socket_type: SocketType::Dealer,
            endpoint: endpoint.clone(),
            options: options.clone(),
            outbound: outbound_rx,
            inbound: inbound_tx,
            stats: stats.clone(),
            events: events.clone(),
        };

        let build = move |driver| Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            options,
            stats,
            events,
            endpoint,
            driver,
        };
        (ctx, build)
    }

    /// Queue a message for sending.
    ///
    /// At the send high water mark this waits (`OverflowPolicy::Block`) or
    /// discards the message (`OverflowPolicy::Drop`). It never waits for the
    /// message to reach the wire.
    pub async fn send(&self, msg: Multipart) -> io::Result<()> {
        match self.options.overflow {
            OverflowPolicy::Block => {
                self.outbound.send_async(msg).await.map_err(|_| closed())?;
            }
            OverflowPolicy::Drop => match self.outbound.try_send(msg) {
                Ok(()) => {}
                Err(flume::TrySendError::Full(_)) => {
                    trace!("[DEALER] Send queue full, dropping message");
                    self.stats.record_dropped();
                    return Ok(());
                }
                Err(flume::TrySendError::Disconnected(_)) => return Err(closed()),
            },
        }
        self.stats.record_queued();
        Ok(())
    }

    /// Queue a message without waiting.
    ///
    /// Fails with `WouldBlock` at the send high water mark, whatever the
    /// overflow policy.
    pub fn try_send(&self, msg: Multipart) -> io::Result<()> {
        match self.outbound.try_send(msg) {
            Ok(()) => {
                self.stats.record_queued();
                Ok(())
            }
            Err(flume::TrySendError::Full(_)) => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "send high water mark reached",
            )),
            Err(flume::TrySendError::Disconnected(_)) => Err(closed()),
        }
    }

    /// Wait for the next message. There is no timeout.
    pub async fn recv(&self) -> io::Result<Multipart> {
        self.inbound.recv_async().await.map_err(|_| closed())
    }

    /// Take the next message if one is queued.
    pub fn try_recv(&self) -> io::Result<Option<Multipart>> {
        match self.inbound.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(flume::TryRecvError::Empty) => Ok(None),
            Err(flume::TryRecvError::Disconnected) => Err(closed()),
        }
    }

    /// Counters for this socket.
    pub fn stats(&self) -> LinkSnapshot {
        self.stats.snapshot()
    }

    /// Subscribe to lifecycle events of this socket.
    ///
    /// Events raised before the first call are not kept. A later call
    /// replaces the earlier subscriber.
    pub fn monitor(&self) -> SocketMonitor {
        self.events.subscribe()
    }

    /// The connected endpoint, or the endpoint actually bound.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn options(&self) -> &SocketOptions {
        &self.options
    }

    /// Close the socket, honouring `linger`, and return the final counters.
    ///
    /// - `Some(Duration::ZERO)`: queued messages are discarded
    /// - `Some(d)`: wait up to `d` for the queue to reach the wire
    /// - `None`: wait until it does
    pub async fn close(self) -> io::Result<LinkSnapshot> {
        let Self {
            outbound,
            stats,
            options,
            driver,
            endpoint,
            ..
        } = self;

        let pending = stats.snapshot().in_queue();
        drop(outbound);

        if pending > 0 {
            match options.linger {
                Some(Duration::ZERO) => discard(&stats, pending),
                Some(linger) => {
                    debug!("[DEALER] Lingering up to {:?} for {} messages", linger, pending);
                    if compio::time::timeout(linger, driver).await.is_err() {
                        discard(&stats, stats.snapshot().in_queue());
                    }
                }
                None => driver.await,
            }
        }

        let snapshot = stats.snapshot();
        debug!("[DEALER] Closed {} ({:?})", endpoint, snapshot);
        Ok(snapshot)
    }

    /// Split into a sink and a stream that can be driven independently.
    ///
    /// The sink always waits at the high water mark. The driver stays alive
    /// until both halves are dropped.
    pub fn split(self) -> (DealerSink, DealerStream) {
        let driver = Rc::new(self.driver);
        let sink = DealerSink {
            inner: self.outbound.into_sink(),
            stats: self.stats,
            _driver: driver.clone(),
        };
        let stream = DealerStream {
            inner: self.inbound.into_stream(),
            _driver: driver,
        };
        (sink, stream)
    }
}

fn discard(stats: &LinkStats, pending: u64) {
    if pending > 0 {
        warn!("Socket closed with {} unsent messages", pending);
        stats.record_lost(pending);
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "socket driver stopped")
}

fn parse_endpoint(endpoint: &str) -> io::Result<Endpoint> {
    Endpoint::parse(endpoint).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Sending half of a split [`DealerSocket`].
pub struct DealerSink {
    inner: flume::r#async::SendSink<'static, Multipart>,
    stats: Arc<LinkStats>,
    _driver: Rc<Task<()>>,
}

impl Sink<Multipart> for DealerSink {
    type Error = io::Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_ready(cx).map_err(|_| closed())
    }

    fn start_send(mut self: Pin<&mut Self>, item: Multipart) -> io::Result<()> {
        Pin::new(&mut self.inner)
            .start_send(item)
            .map_err(|_| closed())?;
        self.stats.record_queued();
        Ok(())
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx).map_err(|_| closed())
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_close(cx).map_err(|_| closed())
    }
}

/// Receiving half of a split [`DealerSocket`]. Ends when the driver stops.
pub struct DealerStream {
    inner: flume::r#async::RecvStream<'static, Multipart>,
    _driver: Rc<Task<()>>,
}

impl Stream for DealerStream {
    type Item = Multipart;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Multipart>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
