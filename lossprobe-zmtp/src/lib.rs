//! # Lossprobe ZMTP
//!
//! ZMTP 3.x DEALER socket on top of `compio`.
//!
//! ## Overview
//!
//! - **codec**: frame encoder and a decoder over a segmented receive buffer
//! - **greeting** / **command**: the 64-byte greeting and the READY command
//! - **handshake**: NULL-mechanism handshake on a fresh stream
//! - **transport**: TCP / IPC connections and listeners
//! - **dealer**: [`DealerSocket`] with queued sends, blocking receives and
//!   stream/sink adapters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lossprobe_core::options::SocketOptions;
//! use lossprobe_zmtp::DealerSocket;
//! use bytes::Bytes;
//!
//! #[compio::main]
//! async fn main() -> std::io::Result<()> {
//!     let socket = DealerSocket::connect("tcp://127.0.0.1:5555", SocketOptions::new()).await?;
//!
//!     socket.send(vec![Bytes::from("Hello!")]).await?;
//!     let response = socket.recv().await?;
//!     assert!(!response.is_empty());
//!     Ok(())
//! }
//! ```

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

use bytes::Bytes;

pub mod codec;
pub mod command;
pub mod dealer;
pub mod greeting;
pub mod handshake;
pub mod socket_type;
pub mod transport;

mod session;

pub use dealer::{DealerSink, DealerSocket, DealerStream};
pub use socket_type::SocketType;

/// A logical message: one or more frames sent and received as a unit.
pub type Multipart = Vec<Bytes>;
