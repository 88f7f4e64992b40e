//! Stream plumbing shared by connect and bind.
//!
//! A connection is either TCP or IPC. Sessions are generic over
//! [`SplitStream`] so that the handshake and both pumps are written once.

use compio::io::{AsyncRead, AsyncWrite};
use compio::net::{OwnedReadHalf, OwnedWriteHalf, TcpListener, TcpStream};
use lossprobe_core::endpoint::Endpoint;
use lossprobe_core::tcp;
use std::io;

#[cfg(unix)]
use compio::net::{UnixListener, UnixStream};
#[cfg(unix)]
use lossprobe_core::ipc;
#[cfg(unix)]
use std::path::PathBuf;

/// A stream that can be split into independently owned halves, so that the
/// reader can wait for data while the writer flushes the outbound queue.
pub trait SplitStream: AsyncRead + AsyncWrite + Sized + 'static {
    type Reader: AsyncRead + 'static;
    type Writer: AsyncWrite + 'static;

    fn split_owned(self) -> (Self::Reader, Self::Writer);
}

impl SplitStream for TcpStream {
    type Reader = OwnedReadHalf<Self>;
    type Writer = OwnedWriteHalf<Self>;

    fn split_owned(self) -> (Self::Reader, Self::Writer) {
        self.into_split()
    }
}

#[cfg(unix)]
impl SplitStream for UnixStream {
    type Reader = OwnedReadHalf<Self>;
    type Writer = OwnedWriteHalf<Self>;

    fn split_owned(self) -> (Self::Reader, Self::Writer) {
        self.into_split()
    }
}

/// An established, not yet handshaken connection.
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Ipc(UnixStream),
}

/// Open a connection to `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> io::Result<Connection> {
    match endpoint {
        Endpoint::Tcp(addr) => Ok(Connection::Tcp(tcp::connect(*addr).await?)),
        #[cfg(unix)]
        Endpoint::Ipc(path) => Ok(Connection::Ipc(ipc::connect(path).await?)),
    }
}

/// A bound listener. IPC listeners remove their socket file on drop.
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Ipc(UnixListener, PathBuf),
}

impl Listener {
    /// Bind `endpoint`, returning the listener and the endpoint it actually
    /// listens on (TCP port 0 resolved).
    pub async fn bind(endpoint: &Endpoint) -> io::Result<(Self, Endpoint)> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener = tcp::bind(*addr).await?;
                let local = listener.local_addr()?;
                Ok((Self::Tcp(listener), Endpoint::Tcp(local)))
            }
            #[cfg(unix)]
            Endpoint::Ipc(path) => {
                let listener = ipc::bind(path).await?;
                Ok((Self::Ipc(listener, path.clone()), endpoint.clone()))
            }
        }
    }

    pub async fn accept(&self) -> io::Result<Connection> {
        match self {
            Self::Tcp(listener) => Ok(Connection::Tcp(tcp::accept(listener).await?)),
            #[cfg(unix)]
            Self::Ipc(listener, _) => Ok(Connection::Ipc(ipc::accept(listener).await?)),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Self::Ipc(_, path) = self {
            let _ = ipc::remove_socket_file(path);
        }
    }
}
