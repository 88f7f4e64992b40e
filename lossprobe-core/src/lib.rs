//! Lossprobe Core
//!
//! This crate contains the protocol-agnostic building blocks shared by the
//! ZMTP layer and the load generator:
//! - Transport addressing (`endpoint`)
//! - Socket options, high-water marks and overflow policy (`options`)
//! - Reconnect backoff (`reconnect`)
//! - Zero-copy segmented receive buffer (`buffer`)
//! - Socket lifecycle events (`monitor`)
//! - Link counters (`stats`)
//! - TCP and IPC transport helpers (`tcp`, `ipc`)
//! - Error types (`error`)

// The tcp module needs raw fd access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod buffer;
pub mod endpoint;
pub mod error;
pub mod monitor;
pub mod options;
pub mod reconnect;
pub mod stats;
pub mod tcp;

#[cfg(unix)]
pub mod ipc;

pub mod prelude {
    pub use crate::buffer::SegmentedBuffer;
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{ProbeError, Result};
    pub use crate::monitor::{SocketEvent, SocketMonitor};
    pub use crate::options::{OverflowPolicy, SocketOptions};
    pub use crate::reconnect::ReconnectState;
    pub use crate::stats::{LinkSnapshot, LinkStats};
}
