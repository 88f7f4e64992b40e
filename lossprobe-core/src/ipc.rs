//! IPC transport via Unix domain sockets.
//!
//! `ipc://` endpoints name a filesystem path; this is the transport the load
//! generator uses by default (`ipc:///tmp/lost-send`).

use compio::net::{UnixListener, UnixStream};
use std::io;
use std::path::Path;

/// Connect to a Unix domain socket.
///
/// Fails with `NotFound` / `ConnectionRefused` while nobody listens on `path`.
pub async fn connect<P: AsRef<Path>>(path: P) -> io::Result<UnixStream> {
    UnixStream::connect(path).await
}

/// Bind a Unix domain socket listener.
///
/// A socket file left behind by a previous process is removed first, the way
/// libzmq rebinds `ipc://` endpoints.
pub async fn bind<P: AsRef<Path>>(path: P) -> io::Result<UnixListener> {
    remove_socket_file(path.as_ref())?;
    UnixListener::bind(path).await
}

/// Accept a connection on a Unix domain socket listener.
pub async fn accept(listener: &UnixListener) -> io::Result<UnixStream> {
    let (stream, _addr) = listener.accept().await?;
    Ok(stream)
}

/// Remove the socket file at `path` if there is one.
pub fn remove_socket_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
