//! Echo peer for the load generator.
//!
//! Binds a DEALER socket and sends every message back the way it came, by
//! forwarding the socket's stream half into its sink half.

use futures::StreamExt;
use lossprobe_core::endpoint::Endpoint;
use lossprobe_core::options::SocketOptions;
use lossprobe_zmtp::DealerSocket;
use std::cell::Cell;
use std::io;
use tracing::{debug, info};

pub struct EchoServer {
    socket: DealerSocket,
}

impl EchoServer {
    pub async fn bind(endpoint: &str, options: SocketOptions) -> io::Result<Self> {
        let socket = DealerSocket::bind(endpoint, options).await?;
        info!("[ECHO] Listening on {}", socket.endpoint());
        Ok(Self { socket })
    }

    /// The endpoint actually bound (TCP port 0 resolved).
    pub fn endpoint(&self) -> &Endpoint {
        self.socket.endpoint()
    }

    /// Echo until the socket fails. Returns how many messages were echoed.
    pub async fn run(self) -> io::Result<u64> {
        let (sink, stream) = self.socket.split();
        let echoed = Cell::new(0u64);

        stream
            .inspect(|_| echoed.set(echoed.get() + 1))
            .map(Ok)
            .forward(sink)
            .await?;

        debug!("[ECHO] Stream ended after {} messages", echoed.get());
        Ok(echoed.get())
    }
}
