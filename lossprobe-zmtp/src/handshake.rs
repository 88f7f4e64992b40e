//! ZMTP 3.x NULL handshake.
//!
//! Runs on the whole stream before it is split into reader and writer
//! halves. Our greeting and READY go out in a single write; the peer's side
//! is read into a `SegmentedBuffer`, and whatever arrives after its READY
//! stays in that buffer for the data phase.

use crate::codec::{encode_frame, ZmtpDecoder, ZmtpError, FLAG_COMMAND};
use crate::command::{parse_ready, write_ready, PeerReady};
use crate::greeting::{write_greeting, Mechanism, ZmtpGreeting, GREETING_SIZE};
use crate::socket_type::SocketType;
use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use lossprobe_core::buffer::SegmentedBuffer;
use std::io;
use std::time::Duration;
use tracing::debug;

/// READY is a handful of properties; anything bigger is not a sane peer.
const MAX_READY_SIZE: usize = 1024;

/// Result of a successful handshake
#[derive(Debug)]
pub struct HandshakeResult {
    pub greeting: ZmtpGreeting,
    pub peer: PeerReady,
    /// Bytes the peer sent after its READY command.
    pub leftover: SegmentedBuffer,
}

/// Exchange greetings and READY commands on `stream`.
pub async fn perform_handshake<S>(
    stream: &mut S,
    local: SocketType,
    identity: Option<&[u8]>,
    read_chunk: usize,
) -> io::Result<HandshakeResult>
where
    S: AsyncRead + AsyncWrite,
{
    debug!("[HANDSHAKE] Starting handshake as {}", local);

    let mut ready: Vec<u8> = Vec::with_capacity(64);
    write_ready(local, identity, &mut ready);
    let mut out: Vec<u8> = Vec::with_capacity(GREETING_SIZE + ready.len() + 2);
    write_greeting(false, &mut out);
    encode_frame(FLAG_COMMAND, &ready, &mut out);

    let BufResult(res, _) = stream.write_all(out).await;
    res?;
    stream.flush().await?;
    debug!("[HANDSHAKE] Sent greeting and READY");

    let mut buf = SegmentedBuffer::new();
    while buf.len() < GREETING_SIZE {
        fill(stream, &mut buf, read_chunk).await?;
    }
    let mut raw = [0u8; GREETING_SIZE];
    buf.copy_prefix(&mut raw);
    buf.advance(GREETING_SIZE);

    let greeting = ZmtpGreeting::parse(&raw)?;
    if let Mechanism::Other(name) = &greeting.mechanism {
        return Err(ZmtpError::Mechanism(name.clone()).into());
    }
    debug!(
        "[HANDSHAKE] Peer greeting ZMTP {}.{}",
        greeting.major, greeting.minor
    );

    let decoder = ZmtpDecoder::with_max_frame_size(Some(MAX_READY_SIZE));
    let frame = loop {
        if let Some(frame) = decoder.decode(&mut buf)? {
            break frame;
        }
        fill(stream, &mut buf, read_chunk).await?;
    };
    if !frame.is_command() {
        return Err(ZmtpError::Command("expected READY, got a data frame").into());
    }

    let peer = parse_ready(&frame.payload)?;
    if !local.is_compatible(peer.socket_type) {
        return Err(ZmtpError::IncompatiblePeer(peer.socket_type.to_string()).into());
    }
    debug!(
        "[HANDSHAKE] Handshake complete, peer is {} ({} bytes buffered)",
        peer.socket_type,
        buf.len()
    );

    Ok(HandshakeResult {
        greeting,
        peer,
        leftover: buf,
    })
}

/// `perform_handshake` bounded by `limit`; `Duration::ZERO` means no limit.
pub async fn perform_handshake_with_timeout<S>(
    stream: &mut S,
    local: SocketType,
    identity: Option<&[u8]>,
    read_chunk: usize,
    limit: Duration,
) -> io::Result<HandshakeResult>
where
    S: AsyncRead + AsyncWrite,
{
    if limit.is_zero() {
        return perform_handshake(stream, local, identity, read_chunk).await;
    }
    compio::time::timeout(limit, perform_handshake(stream, local, identity, read_chunk))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("handshake did not finish within {limit:?}"),
            )
        })?
}

async fn fill<S: AsyncRead>(
    stream: &mut S,
    buf: &mut SegmentedBuffer,
    read_chunk: usize,
) -> io::Result<()> {
    let BufResult(res, data) = stream.read(Vec::with_capacity(read_chunk)).await;
    if res? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed the connection during the handshake",
        ));
    }
    buf.push(Bytes::from(data));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_multipart;
    use compio::net::{TcpListener, TcpStream};

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = compio::runtime::spawn(async move { listener.accept().await });
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = accept.await.unwrap();
        (client, server)
    }

    #[compio::test]
    async fn test_dealer_to_router_handshake() {
        let (mut client, mut server) = pair().await;

        let server_side = compio::runtime::spawn(async move {
            perform_handshake(&mut server, SocketType::Router, None, 256).await
        });
        let client_result = perform_handshake(&mut client, SocketType::Dealer, Some(b"me"), 256)
            .await
            .unwrap();
        let server_result = server_side.await.unwrap();

        assert_eq!(client_result.peer.socket_type, SocketType::Router);
        assert_eq!(server_result.peer.socket_type, SocketType::Dealer);
        assert_eq!(server_result.peer.identity.as_deref(), Some(&b"me"[..]));
        assert!(client_result.leftover.is_empty());
    }

    #[compio::test]
    async fn test_incompatible_peer_rejected() {
        let (mut client, mut server) = pair().await;

        let server_side = compio::runtime::spawn(async move {
            perform_handshake(&mut server, SocketType::Pub, None, 256).await
        });
        let err = perform_handshake(&mut client, SocketType::Dealer, None, 256)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let _ = server_side.await;
    }

    #[compio::test]
    async fn test_data_after_ready_is_kept() {
        let (mut client, mut server) = pair().await;

        // A peer that pipelines a data frame right behind its READY.
        let server_side = compio::runtime::spawn(async move {
            let mut out: Vec<u8> = Vec::new();
            write_greeting(false, &mut out);
            let mut ready: Vec<u8> = Vec::new();
            write_ready(SocketType::Dealer, None, &mut ready);
            encode_frame(FLAG_COMMAND, &ready, &mut out);
            encode_multipart(&[Bytes::from_static(b"msg")], &mut out);
            let BufResult(res, _) = server.write_all(out).await;
            res.unwrap();
            server
        });

        let mut result = perform_handshake(&mut client, SocketType::Dealer, None, 4096)
            .await
            .unwrap();
        let _server = server_side.await;

        let frame = ZmtpDecoder::new()
            .decode(&mut result.leftover)
            .unwrap()
            .unwrap();
        assert_eq!(&frame.payload[..], b"msg");
    }

    #[compio::test]
    async fn test_silent_peer_times_out() {
        let (mut client, _server) = pair().await;

        let err = perform_handshake_with_timeout(
            &mut client,
            SocketType::Dealer,
            None,
            256,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
