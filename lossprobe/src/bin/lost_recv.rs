//! Receive from `ipc:///tmp/lost-send` forever, printing the count every 100.

use lossprobe::dev_tracing::init_tracing;
use lossprobe::loadgen::{LoadConfig, RoundTripLoadGenerator, StdoutProgress};
use lossprobe::ProbeError;

#[compio::main]
async fn main() -> Result<(), ProbeError> {
    init_tracing();

    RoundTripLoadGenerator::new(LoadConfig::default())?
        .drain(&mut StdoutProgress::new(), None)
        .await?;
    Ok(())
}
