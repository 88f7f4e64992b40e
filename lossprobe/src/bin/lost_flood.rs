//! Send "hi" to `ipc:///tmp/lost-send` forever, never reading.

use lossprobe::dev_tracing::init_tracing;
use lossprobe::loadgen::{LoadConfig, RoundTripLoadGenerator};
use lossprobe::ProbeError;

#[compio::main]
async fn main() -> Result<(), ProbeError> {
    init_tracing();

    let config = LoadConfig::default().with_payload("hi").with_hwm(8192);
    RoundTripLoadGenerator::new(config)?.flood(None).await?;
    Ok(())
}
