//! # simple-counter Agent
//!
//! Runs simple-counter polling adapters and publishes their samples.
//!
//! ## Architecture
//!
//! - **Configuration**: adapters and publisher settings from the environment
//! - **Scheduling**: one task per adapter, polled at its configured interval
//! - **Error budget**: adapters that fail too often in a row are removed
//! - **Publishing**: MQTT, or the log for dry runs

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod publisher;
mod runtime;
mod scheduler;

pub use config::AgentConfig;
pub use runtime::Agent;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting simple-counter agent"
    );

    let config = AgentConfig::from_env()?;

    let agent = Agent::new(config);

    agent.run().await?;

    Ok(())
}
