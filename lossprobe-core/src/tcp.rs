//! TCP transport helpers.
//!
//! # Safety
//!
//! Setting `TCP_NODELAY` goes through `socket2` on the raw descriptor of the
//! compio stream. The descriptor is borrowed, never closed here.

#![allow(unsafe_code)]

use compio::net::{TcpListener, TcpStream};
use std::io;
use std::mem::ManuallyDrop;
use std::net::SocketAddr;

/// Enable TCP_NODELAY on a compio TcpStream.
///
/// Small fire-and-forget messages must not sit in Nagle's buffer.
#[inline]
pub fn enable_tcp_nodelay(stream: &TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        // SAFETY: `fd` stays owned by `stream`; ManuallyDrop keeps socket2 from closing it.
        let sock = ManuallyDrop::new(unsafe { socket2::Socket::from_raw_fd(fd) });
        sock.set_nodelay(true)
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        // SAFETY: as above, the socket handle stays owned by `stream`.
        let sock = ManuallyDrop::new(unsafe { socket2::Socket::from_raw_socket(raw) });
        sock.set_nodelay(true)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = stream;
        Ok(())
    }
}

/// Connect to `addr` with TCP_NODELAY enabled.
pub async fn connect(addr: SocketAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    enable_tcp_nodelay(&stream)?;
    Ok(stream)
}

/// Bind a TCP listener. Port 0 picks a free port; ask the listener for it.
pub async fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Accept one connection with TCP_NODELAY enabled.
pub async fn accept(listener: &TcpListener) -> io::Result<TcpStream> {
    let (stream, _addr) = listener.accept().await?;
    enable_tcp_nodelay(&stream)?;
    Ok(stream)
}
