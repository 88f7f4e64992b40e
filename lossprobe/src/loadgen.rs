//! Round-trip load generation.
//!
//! A run queues `count` single-frame messages on a connecting DEALER socket
//! without waiting for delivery, then waits for as many replies, reporting
//! progress every `progress_interval` replies. Replies that never come make
//! the run wait forever: losing messages shows up as a hang, not an error.

use bytes::Bytes;
use lossprobe_core::endpoint::Endpoint;
use lossprobe_core::error::{ProbeError, Result};
use lossprobe_core::options::{OverflowPolicy, SocketOptions};
use lossprobe_zmtp::DealerSocket;
use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Endpoint the generator, the echo server and the flood/drain tools share.
pub const DEFAULT_ENDPOINT: &str = "ipc:///tmp/lost-send";

/// Messages per run.
pub const DEFAULT_COUNT: usize = 5000;

/// Large enough to hold every outstanding message of a default run in both
/// directions.
pub const DEFAULT_HWM: usize = 16384;

pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

pub const DEFAULT_PAYLOAD: &[u8] = b"msg";

/// Load generator configuration.
///
/// # Examples
///
/// ```
/// use lossprobe::loadgen::LoadConfig;
///
/// let config = LoadConfig::default().with_count(250);
/// assert_eq!(config.endpoint, "ipc:///tmp/lost-send");
/// assert_eq!(config.hwm, 16384);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub endpoint: String,
    /// Messages sent, and replies waited for.
    pub count: usize,
    pub payload: Bytes,
    /// Send and receive high water mark of the socket.
    pub hwm: usize,
    /// Report every this many replies.
    pub progress_interval: usize,
    pub identity: Option<Bytes>,
    pub overflow: OverflowPolicy,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            count: DEFAULT_COUNT,
            payload: Bytes::from_static(DEFAULT_PAYLOAD),
            hwm: DEFAULT_HWM,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            identity: None,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl LoadConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_hwm(mut self, hwm: usize) -> Self {
        self.hwm = hwm;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<Bytes>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Reject values no run can use.
    ///
    /// A high water mark below twice the count is allowed: that is exactly
    /// the buffer-exhaustion case worth probing. It only gets a warning.
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval == 0 {
            return Err(ProbeError::invalid_config(
                "progress interval must be at least 1",
            ));
        }
        Endpoint::parse(&self.endpoint)?;
        self.socket_options().validate()?;
        if self.hwm < self.count.saturating_mul(2) {
            warn!(
                "HWM {} is below 2 x {} messages; sends may block or drop",
                self.hwm, self.count
            );
        }
        Ok(())
    }

    /// Socket options for this run.
    pub fn socket_options(&self) -> SocketOptions {
        let options = SocketOptions::new()
            .with_hwm(self.hwm)
            .with_overflow(self.overflow);
        match &self.identity {
            Some(id) => options.with_routing_id(id.clone()),
            None => options,
        }
    }
}

/// Where progress counts go.
pub trait ProgressSink {
    fn report(&mut self, count: usize) -> io::Result<()>;
}

/// Prints each count on its own line.
#[derive(Debug, Default)]
pub struct StdoutProgress;

impl StdoutProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressSink for StdoutProgress {
    fn report(&mut self, count: usize) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{count}")?;
        out.flush()
    }
}

impl ProgressSink for Vec<usize> {
    fn report(&mut self, count: usize) -> io::Result<()> {
        self.push(count);
        Ok(())
    }
}

impl<P: ProgressSink + ?Sized> ProgressSink for &mut P {
    fn report(&mut self, count: usize) -> io::Result<()> {
        (**self).report(count)
    }
}

/// What one run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub sent: usize,
    pub received: usize,
    pub progress_lines: usize,
    /// Discarded at the high water mark (`OverflowPolicy::Drop` only).
    pub dropped: u64,
    pub lost: u64,
    pub elapsed: Duration,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent {} received {} in {:?} ({} progress lines, {} dropped, {} lost)",
            self.sent, self.received, self.elapsed, self.progress_lines, self.dropped, self.lost
        )
    }
}

/// Counts from [`receive_phase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveCount {
    pub received: usize,
    pub progress_lines: usize,
}

/// Queue `payload` as single-frame messages, `limit` times or forever.
///
/// Returns the number of messages handed to the socket.
pub async fn send_phase(socket: &DealerSocket, payload: &Bytes, limit: Option<usize>) -> Result<usize> {
    let mut sent = 0;
    while limit.map_or(true, |n| sent < n) {
        socket
            .send(vec![payload.clone()])
            .await
            .map_err(ProbeError::from_socket)?;
        sent += 1;
    }
    debug!("[LOADGEN] Queued {} messages", sent);
    Ok(sent)
}

/// Receive `limit` messages (or forever), reporting every `interval`-th.
///
/// There is no timeout: missing replies keep this waiting.
pub async fn receive_phase<P: ProgressSink + ?Sized>(
    socket: &DealerSocket,
    progress: &mut P,
    interval: usize,
    limit: Option<usize>,
) -> Result<ReceiveCount> {
    if interval == 0 {
        return Err(ProbeError::invalid_config(
            "progress interval must be at least 1",
        ));
    }

    let mut count = ReceiveCount::default();
    while limit.map_or(true, |n| count.received < n) {
        socket.recv().await.map_err(ProbeError::from_socket)?;
        count.received += 1;
        if count.received % interval == 0 {
            progress.report(count.received)?;
            count.progress_lines += 1;
        }
    }
    Ok(count)
}

/// Connects, sends a batch, waits for the same number of replies.
#[derive(Debug, Clone)]
pub struct RoundTripLoadGenerator {
    config: LoadConfig,
}

impl RoundTripLoadGenerator {
    pub fn new(config: LoadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// One full run. The socket is released when this returns, on success
    /// and on error alike.
    pub async fn run<P: ProgressSink + ?Sized>(&self, progress: &mut P) -> Result<RunReport> {
        let config = &self.config;
        let started = Instant::now();

        let socket = DealerSocket::connect(&config.endpoint, config.socket_options()).await?;
        debug!(
            "[LOADGEN] Round trip of {} messages via {}",
            config.count,
            socket.endpoint()
        );

        let sent = send_phase(&socket, &config.payload, Some(config.count)).await?;
        let received = receive_phase(
            &socket,
            progress,
            config.progress_interval,
            Some(config.count),
        )
        .await?;

        let stats = socket.stats();
        let report = RunReport {
            sent,
            received: received.received,
            progress_lines: received.progress_lines,
            dropped: stats.dropped,
            lost: stats.lost,
            elapsed: started.elapsed(),
        };
        info!("[LOADGEN] {}", report);
        Ok(report)
    }

    /// Send the payload forever (or `limit` times) without reading.
    pub async fn flood(&self, limit: Option<usize>) -> Result<usize> {
        let socket = DealerSocket::connect(&self.config.endpoint, self.config.socket_options()).await?;
        send_phase(&socket, &self.config.payload, limit).await
    }

    /// Receive forever (or `limit` times) without sending.
    pub async fn drain<P: ProgressSink + ?Sized>(
        &self,
        progress: &mut P,
        limit: Option<usize>,
    ) -> Result<ReceiveCount> {
        let socket = DealerSocket::connect(&self.config.endpoint, self.config.socket_options()).await?;
        receive_phase(&socket, progress, self.config.progress_interval, limit).await
    }
}
