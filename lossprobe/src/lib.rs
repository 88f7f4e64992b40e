//! # Lossprobe
//!
//! A round-trip load generator for ZeroMQ DEALER sockets, built on `io_uring`.
//!
//! ## Architecture
//!
//! - **`lossprobe-core`**: endpoints, socket options, buffers, counters
//! - **`lossprobe-zmtp`**: ZMTP 3.x framing, handshake and the DEALER socket
//! - **`lossprobe`**: the load generator, the echo peer and the binaries
//!   (this crate)
//!
//! ## Binaries
//!
//! All four use `ipc:///tmp/lost-send` and take no arguments:
//!
//! - `lost-server`: echoes every message back
//! - `lost-send`: sends 5000 messages, waits for 5000 replies, prints every 100th
//! - `lost-flood`: sends forever
//! - `lost-recv`: receives forever, printing every 100th
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lossprobe::loadgen::{LoadConfig, RoundTripLoadGenerator, StdoutProgress};
//!
//! #[compio::main]
//! async fn main() -> Result<(), lossprobe::ProbeError> {
//!     let generator = RoundTripLoadGenerator::new(LoadConfig::default().with_count(1000))?;
//!     let report = generator.run(&mut StdoutProgress::new()).await?;
//!     assert_eq!(report.received, 1000);
//!     Ok(())
//! }
//! ```

pub mod dev_tracing;
pub mod echo;
pub mod loadgen;

pub use lossprobe_core::endpoint::Endpoint;
pub use lossprobe_core::error::{ProbeError, Result};
pub use lossprobe_core::monitor::{SocketEvent, SocketMonitor};
pub use lossprobe_core::options::{OverflowPolicy, SocketOptions};
pub use lossprobe_core::stats::LinkSnapshot;
pub use lossprobe_zmtp::{DealerSink, DealerSocket, DealerStream, Multipart};

/// Convenient imports.
///
/// ```rust
/// use lossprobe::prelude::*;
///
/// let config = LoadConfig::default();
/// assert_eq!(config.count, 5000);
/// ```
pub mod prelude {
    pub use crate::echo::EchoServer;
    pub use crate::loadgen::{
        LoadConfig, ProgressSink, RoundTripLoadGenerator, RunReport, StdoutProgress,
    };
    pub use crate::{DealerSocket, OverflowPolicy, ProbeError, SocketOptions};
    pub use bytes::Bytes;
}
