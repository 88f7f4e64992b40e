//! Background connection driver.
//!
//! One driver task per socket. It owns the receiving end of the outbound
//! queue and the sending end of the inbound queue; the application never
//! touches a stream directly. Per live connection the driver spawns a reader
//! task and runs the writer pump itself:
//!
//! ```text
//! app --send--> [outbound, send_hwm] --writer pump--> stream
//! app <--recv-- [inbound, recv_hwm]  <--reader task-- stream
//! ```
//!
//! The outbound queue lives across connections in connect mode. In bind mode
//! it is flushed (and counted as lost) when the peer goes away.

use crate::codec::{encode_multipart, ZmtpDecoder};
use crate::handshake::perform_handshake_with_timeout;
use crate::socket_type::SocketType;
use crate::transport::{self, Connection, Listener, SplitStream};
use crate::Multipart;
use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWriteExt};
use futures::{select, FutureExt};
use lossprobe_core::buffer::SegmentedBuffer;
use lossprobe_core::endpoint::Endpoint;
use lossprobe_core::monitor::{EventSlot, SocketEvent};
use lossprobe_core::options::SocketOptions;
use lossprobe_core::reconnect::ReconnectState;
use lossprobe_core::stats::LinkStats;
use smallvec::SmallVec;
use std::io;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Everything the driver needs, moved into its task.
pub(crate) struct DriverContext {
    pub(crate) mode: Mode,
    pub(crate) socket_type: SocketType,
    pub(crate) endpoint: Endpoint,
    pub(crate) options: SocketOptions,
    pub(crate) outbound: flume::Receiver<Multipart>,
    pub(crate) inbound: flume::Sender<Multipart>,
    pub(crate) stats: Arc<LinkStats>,
    pub(crate) events: EventSlot,
}

/// Whether the socket dials out or accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Connect,
    Bind,
}

/// How a session with one peer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The application closed the socket and the queue is flushed.
    Closed,
    /// The peer went away or a write failed.
    PeerGone,
}

impl DriverContext {
    fn emit(&self, event: SocketEvent) {
        self.events.emit(event);
    }

    fn is_closed(&self) -> bool {
        self.outbound.is_disconnected() && self.outbound.is_empty()
    }

    /// Connect, handshake, pump; reconnect when the peer goes away.
    pub(crate) async fn drive_connect(self) {
        let mut backoff = ReconnectState::new(&self.options);

        while let Some(conn) = self.dial(&mut backoff).await {
            match self.run(conn).await {
                Ok(SessionEnd::Closed) => break,
                Ok(SessionEnd::PeerGone) => {
                    backoff.reset();
                    self.emit(SocketEvent::Disconnected(self.endpoint.clone()));
                }
                Err(e) => {
                    warn!("Handshake with {} failed: {}", self.endpoint, e);
                    self.emit(SocketEvent::HandshakeFailed {
                        endpoint: self.endpoint.clone(),
                        reason: e.to_string(),
                    });
                    compio::time::sleep(backoff.next_delay()).await;
                }
            }
        }
        debug!("[DRIVER] Connect driver for {} finished", self.endpoint);
    }

    /// Accept one peer at a time on `listener` until the socket closes.
    pub(crate) async fn drive_bind(self, listener: Listener) {
        self.emit(SocketEvent::Bound(self.endpoint.clone()));

        loop {
            if self.is_closed() {
                break;
            }
            let conn = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Accept on {} failed: {}", self.endpoint, e);
                    break;
                }
            };

            match self.run(conn).await {
                Ok(SessionEnd::Closed) => break,
                Ok(SessionEnd::PeerGone) => {
                    let stale = self.outbound.drain().count() as u64;
                    if stale > 0 {
                        warn!(
                            "Peer on {} left, discarding {} queued messages",
                            self.endpoint, stale
                        );
                        self.stats.record_lost(stale);
                    }
                    self.emit(SocketEvent::Disconnected(self.endpoint.clone()));
                }
                Err(e) => {
                    warn!("Handshake on {} failed: {}", self.endpoint, e);
                    self.emit(SocketEvent::HandshakeFailed {
                        endpoint: self.endpoint.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!("[DRIVER] Bind driver for {} finished", self.endpoint);
    }

    /// Retry until a connection is open. `None` once the socket is closed
    /// and nothing is left to deliver.
    async fn dial(&self, backoff: &mut ReconnectState) -> Option<Connection> {
        loop {
            if self.is_closed() {
                return None;
            }
            match transport::connect(&self.endpoint).await {
                Ok(conn) => return Some(conn),
                Err(e) => {
                    let delay = backoff.next_delay();
                    trace!(
                        "Connect to {} failed ({}), retry {} in {:?}",
                        self.endpoint,
                        e,
                        backoff.attempt(),
                        delay
                    );
                    self.emit(SocketEvent::ConnectRetried {
                        endpoint: self.endpoint.clone(),
                        reason: e.to_string(),
                        delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    });
                    compio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn run(&self, conn: Connection) -> io::Result<SessionEnd> {
        match conn {
            Connection::Tcp(stream) => self.session(stream).await,
            #[cfg(unix)]
            Connection::Ipc(stream) => self.session(stream).await,
        }
    }

    async fn session<S: SplitStream>(&self, mut stream: S) -> io::Result<SessionEnd> {
        let handshake = perform_handshake_with_timeout(
            &mut stream,
            self.socket_type,
            self.options.routing_id.as_deref(),
            self.options.read_buffer_size,
            self.options.handshake_timeout,
        )
        .await?;

        let event = match self.mode {
            Mode::Connect => SocketEvent::Connected(self.endpoint.clone()),
            Mode::Bind => SocketEvent::Accepted(self.endpoint.clone()),
        };
        let peer = &handshake.peer;
        debug!(
            "[DRIVER] {} (peer {} over ZMTP {}.{}, identity {:?})",
            event,
            peer.socket_type,
            handshake.greeting.major,
            handshake.greeting.minor,
            peer.identity.as_deref().map(String::from_utf8_lossy)
        );
        self.emit(event);

        let (reader, writer) = stream.split_owned();
        let reader = compio::runtime::spawn(read_pump(
            reader,
            handshake.leftover,
            ZmtpDecoder::with_max_frame_size(self.options.max_msg_size),
            self.inbound.clone(),
            self.stats.clone(),
            self.options.read_buffer_size,
        ));

        Ok(self.write_pump(writer, reader).await)
    }

    /// Flush the outbound queue into `writer` until the application closes
    /// the socket, the reader sees EOF, or a write fails.
    ///
    /// After a failed write the reader runs to completion, so every reply
    /// already on the wire still reaches the inbound queue.
    async fn write_pump<W, R>(&self, mut writer: W, reader: R) -> SessionEnd
    where
        W: compio::io::AsyncWrite,
        R: std::future::Future<Output = io::Result<()>>,
    {
        let reader = reader.fuse();
        futures::pin_mut!(reader);
        let mut batch: Vec<u8> = Vec::with_capacity(self.options.write_buffer_size);

        loop {
            let first = select! {
                msg = self.outbound.recv_async().fuse() => match msg {
                    Ok(msg) => msg,
                    Err(_) => {
                        debug!("[DRIVER] Outbound queue closed and flushed");
                        return SessionEnd::Closed;
                    }
                },
                res = reader => {
                    match res {
                        Ok(()) => debug!("[DRIVER] Peer on {} closed the connection", self.endpoint),
                        Err(e) => warn!("Read from {} failed: {}", self.endpoint, e),
                    }
                    return SessionEnd::PeerGone;
                }
            };

            batch.clear();
            encode_multipart(&first, &mut batch);
            let mut count = 1u64;
            while batch.len() < self.options.write_buffer_size {
                let Ok(msg) = self.outbound.try_recv() else {
                    break;
                };
                encode_multipart(&msg, &mut batch);
                count += 1;
            }

            let BufResult(res, buf) = writer.write_all(batch).await;
            batch = buf;
            match res {
                Ok(()) => {
                    trace!("[DRIVER] Wrote {} messages ({} bytes)", count, batch.len());
                    self.stats.record_written(count);
                }
                Err(e) => {
                    warn!(
                        "Write to {} failed, {} messages lost: {}",
                        self.endpoint, count, e
                    );
                    self.stats.record_lost(count);
                    // The reader still owns replies that arrived before the
                    // failure; it finishes at EOF on the broken stream.
                    if let Err(e) = reader.await {
                        debug!("[DRIVER] Read from {} ended: {}", self.endpoint, e);
                    }
                    return SessionEnd::PeerGone;
                }
            }
        }
    }
}

/// Decode frames into multipart messages and hand them to the application.
///
/// Waiting on a full inbound queue stops reading the stream, which pushes
/// back on the peer through the transport. Returns `Ok(())` on EOF.
async fn read_pump<R: AsyncRead>(
    mut reader: R,
    mut buf: SegmentedBuffer,
    decoder: ZmtpDecoder,
    inbound: flume::Sender<Multipart>,
    stats: Arc<LinkStats>,
    read_chunk: usize,
) -> io::Result<()> {
    let mut parts: SmallVec<[Bytes; 4]> = SmallVec::new();

    loop {
        while let Some(frame) = decoder.decode(&mut buf)? {
            if frame.is_command() {
                trace!("[DRIVER] Ignoring command frame ({} bytes)", frame.payload.len());
                continue;
            }
            let more = frame.more();
            parts.push(frame.payload);
            if more {
                continue;
            }

            let msg = std::mem::take(&mut parts).into_vec();
            // Nobody left to read it once the application side is dropped.
            if inbound.send_async(msg).await.is_ok() {
                stats.record_received();
            }
        }

        let BufResult(res, data) = reader.read(Vec::with_capacity(read_chunk)).await;
        if res? == 0 {
            return Ok(());
        }
        buf.push(Bytes::from(data));
    }
}
