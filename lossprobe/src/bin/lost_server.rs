//! Echo every message received on `ipc:///tmp/lost-send`.

use lossprobe::dev_tracing::init_tracing;
use lossprobe::echo::EchoServer;
use lossprobe::loadgen::{DEFAULT_ENDPOINT, DEFAULT_HWM};
use lossprobe::{ProbeError, SocketOptions};

#[compio::main]
async fn main() -> Result<(), ProbeError> {
    init_tracing();

    let server = EchoServer::bind(DEFAULT_ENDPOINT, SocketOptions::new().with_hwm(DEFAULT_HWM)).await?;
    let echoed = server.run().await?;
    tracing::info!("Echoed {} messages", echoed);
    Ok(())
}
