//! Lossprobe error types
//!
//! One error type for everything above the wire: socket setup, the socket
//! going away mid-run, load-generator configuration.

use std::io;
use thiserror::Error;

use crate::endpoint::EndpointError;

/// Main error type for lossprobe operations
#[derive(Error, Debug)]
pub enum ProbeError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Endpoint could not be parsed or used
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// The socket (or its background driver) is gone
    #[error("Socket closed")]
    SocketClosed,

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for lossprobe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// Create a configuration error with a message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Convert an error from a socket send or receive.
    ///
    /// Sockets report a stopped background driver as `BrokenPipe`.
    pub fn from_socket(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::BrokenPipe {
            Self::SocketClosed
        } else {
            Self::Io(err)
        }
    }
}
