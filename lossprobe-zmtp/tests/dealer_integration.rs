//! DEALER-to-DEALER integration tests over real TCP and IPC sockets.

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::AsyncWriteExt;
use compio::net::TcpStream;
use lossprobe_core::monitor::{SocketEvent, SocketMonitor};
use lossprobe_core::options::SocketOptions;
use lossprobe_zmtp::codec::{encode_frame, FLAG_COMMAND};
use lossprobe_zmtp::command::write_ready;
use lossprobe_zmtp::greeting::write_greeting;
use lossprobe_zmtp::{DealerSocket, SocketType};
use std::time::Duration;

fn ipc_endpoint(name: &str) -> String {
    format!("ipc:///tmp/lossprobe_zmtp_{name}_{}.sock", std::process::id())
}

/// Wait (bounded) for the first event matching `pred`.
async fn wait_for(monitor: &SocketMonitor, pred: impl Fn(&SocketEvent) -> bool) -> SocketEvent {
    compio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = monitor.recv_async().await.expect("monitor closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event did not arrive")
}

#[compio::test]
async fn test_round_trip_over_tcp() {
    let server = DealerSocket::bind("tcp://127.0.0.1:0", SocketOptions::new())
        .await
        .unwrap();
    let endpoint = server.endpoint().to_string();
    let client = DealerSocket::connect(&endpoint, SocketOptions::new())
        .await
        .unwrap();

    client.send(vec![Bytes::from_static(b"msg")]).await.unwrap();
    let request = server.recv().await.unwrap();
    assert_eq!(request, vec![Bytes::from_static(b"msg")]);

    server.send(request).await.unwrap();
    let reply = client.recv().await.unwrap();
    assert_eq!(&reply[0][..], b"msg");
}

#[compio::test]
async fn test_multipart_and_long_frames_survive() {
    let server = DealerSocket::bind(&ipc_endpoint("multipart"), SocketOptions::new())
        .await
        .unwrap();
    let client = DealerSocket::connect(&server.endpoint().to_string(), SocketOptions::new())
        .await
        .unwrap();

    let big = Bytes::from(vec![0xAB; 70_000]);
    let msg = vec![Bytes::from_static(b"head"), Bytes::new(), big.clone()];
    client.send(msg.clone()).await.unwrap();

    let received = server.recv().await.unwrap();
    assert_eq!(received.len(), 3);
    assert_eq!(received[0], msg[0]);
    assert!(received[1].is_empty());
    assert_eq!(received[2], big);
}

#[compio::test]
async fn test_messages_queued_before_bind_are_delivered() {
    let endpoint = ipc_endpoint("late_bind");
    let options = SocketOptions::new().with_reconnect_ivl(Duration::from_millis(10));
    let client = DealerSocket::connect(&endpoint, options).await.unwrap();

    for _ in 0..10 {
        client.send(vec![Bytes::from_static(b"early")]).await.unwrap();
    }
    compio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.stats().written, 0);

    let server = DealerSocket::bind(&endpoint, SocketOptions::new())
        .await
        .unwrap();
    for _ in 0..10 {
        let msg = server.recv().await.unwrap();
        assert_eq!(&msg[0][..], b"early");
    }
}

#[compio::test]
async fn test_reconnects_to_restarted_peer() {
    let endpoint = ipc_endpoint("restart");
    let options = SocketOptions::new().with_reconnect_ivl(Duration::from_millis(10));
    let client = DealerSocket::connect(&endpoint, options).await.unwrap();
    let monitor = client.monitor();

    let first = DealerSocket::bind(&endpoint, SocketOptions::new())
        .await
        .unwrap();
    client.send(vec![Bytes::from_static(b"one")]).await.unwrap();
    assert_eq!(&first.recv().await.unwrap()[0][..], b"one");
    wait_for(&monitor, |e| matches!(e, SocketEvent::Connected(_))).await;

    drop(first);
    wait_for(&monitor, |e| matches!(e, SocketEvent::Disconnected(_))).await;

    let second = DealerSocket::bind(&endpoint, SocketOptions::new())
        .await
        .unwrap();
    client.send(vec![Bytes::from_static(b"two")]).await.unwrap();
    assert_eq!(&second.recv().await.unwrap()[0][..], b"two");
}

#[compio::test]
async fn test_close_lingers_until_queue_is_written() {
    let server = DealerSocket::bind(&ipc_endpoint("linger"), SocketOptions::new())
        .await
        .unwrap();
    let client = DealerSocket::connect(
        &server.endpoint().to_string(),
        SocketOptions::new().with_linger(Some(Duration::from_secs(5))),
    )
    .await
    .unwrap();

    for _ in 0..500 {
        client.send(vec![Bytes::from_static(b"msg")]).await.unwrap();
    }
    let stats = client.close().await.unwrap();
    assert_eq!(stats.queued, 500);
    assert_eq!(stats.written, 500);
    assert_eq!(stats.lost, 0);

    for _ in 0..500 {
        server.recv().await.unwrap();
    }
}

#[compio::test]
async fn test_incompatible_peer_is_refused() {
    let server = DealerSocket::bind("tcp://127.0.0.1:0", SocketOptions::new())
        .await
        .unwrap();
    let monitor = server.monitor();
    let addr = server.endpoint().to_string();
    let addr = addr.trim_start_matches("tcp://");

    // Raw PUB peer.
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut out: Vec<u8> = Vec::new();
    write_greeting(false, &mut out);
    let mut ready: Vec<u8> = Vec::new();
    write_ready(SocketType::Pub, None, &mut ready);
    encode_frame(FLAG_COMMAND, &ready, &mut out);
    let BufResult(res, _) = stream.write_all(out).await;
    res.unwrap();

    let event = wait_for(&monitor, |e| matches!(e, SocketEvent::HandshakeFailed { .. })).await;
    let SocketEvent::HandshakeFailed { reason, .. } = event else {
        unreachable!();
    };
    assert!(reason.contains("PUB"), "unexpected reason: {reason}");
}

#[compio::test]
async fn test_replies_survive_failed_write() {
    let server = DealerSocket::bind(&ipc_endpoint("replies_then_close"), SocketOptions::new())
        .await
        .unwrap();
    // Small inbound queue so most replies are still with the reader when
    // the write fails.
    let client = DealerSocket::connect(
        &server.endpoint().to_string(),
        SocketOptions::new().with_recv_hwm(8),
    )
    .await
    .unwrap();

    for _ in 0..50 {
        server.send(vec![Bytes::from_static(b"reply")]).await.unwrap();
    }
    let server_stats = server.close().await.unwrap();
    assert_eq!(server_stats.written, 50);

    // Peer is gone; these writes hit a closed stream.
    for _ in 0..5 {
        client.send(vec![Bytes::from_static(b"msg")]).await.unwrap();
        compio::time::sleep(Duration::from_millis(20)).await;
    }

    for _ in 0..50 {
        let reply = compio::time::timeout(Duration::from_secs(5), client.recv())
            .await
            .expect("reply went missing")
            .unwrap();
        assert_eq!(&reply[0][..], b"reply");
    }
    assert_eq!(client.stats().received, 50);
}

#[compio::test]
async fn test_silent_peer_times_out() {
    let server = DealerSocket::bind(
        "tcp://127.0.0.1:0",
        SocketOptions::new().with_handshake_timeout(Duration::from_millis(200)),
    )
    .await
    .unwrap();
    let monitor = server.monitor();
    let addr = server.endpoint().to_string();

    // Connects and never sends a greeting.
    let _stream = TcpStream::connect(addr.trim_start_matches("tcp://"))
        .await
        .unwrap();

    let event = wait_for(&monitor, |e| matches!(e, SocketEvent::HandshakeFailed { .. })).await;
    assert!(matches!(event, SocketEvent::HandshakeFailed { .. }));
}

#[compio::test]
async fn test_split_halves_echo() {
    use futures::{SinkExt, StreamExt};

    let server = DealerSocket::bind(&ipc_endpoint("split"), SocketOptions::new())
        .await
        .unwrap();
    let client = DealerSocket::connect(&server.endpoint().to_string(), SocketOptions::new())
        .await
        .unwrap();

    let (mut sink, mut stream) = server.split();
    compio::runtime::spawn(async move {
        while let Some(msg) = stream.next().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    })
    .detach();

    for i in 0..100u32 {
        client.send(vec![Bytes::from(i.to_string())]).await.unwrap();
    }
    for i in 0..100u32 {
        let reply = client.recv().await.unwrap();
        assert_eq!(reply[0], Bytes::from(i.to_string()));
    }
}
