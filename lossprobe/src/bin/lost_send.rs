//! Send 5000 messages to `ipc:///tmp/lost-send`, then wait for 5000 replies,
//! printing the count every 100.

use lossprobe::dev_tracing::init_tracing;
use lossprobe::loadgen::{LoadConfig, RoundTripLoadGenerator, StdoutProgress};
use lossprobe::ProbeError;

#[compio::main]
async fn main() -> Result<(), ProbeError> {
    init_tracing();

    let generator = RoundTripLoadGenerator::new(LoadConfig::default())?;
    generator.run(&mut StdoutProgress::new()).await?;
    Ok(())
}
