//! # homecored, the homecore daemon
//!
//! Composition root that wires integrations into the hub and runs it.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Build the [`Hub`] and set up enabled integrations
//! - Start the hub and wait for Ctrl-C
//! - Stop the hub, then tear integrations down
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer, no domain logic belongs here.

mod config;

use std::sync::Arc;

use homecore_adapter_virtual::VirtualIntegration;
use homecore_app::hub::Hub;
use homecore_app::ports::Integration;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let hub = Arc::new(Hub::new(config.hub.clone(), &config.hub_options()));

    let mut integrations: Vec<Box<dyn Integration + Send>> = Vec::new();
    if config.integrations.virtual_enabled {
        integrations.push(Box::new(VirtualIntegration::default()));
    }
    for integration in &mut integrations {
        integration.setup(&hub)?;
        tracing::info!(integration = integration.name(), "integration set up");
    }

    hub.start()?;
    tracing::info!(
        location = %config.hub.location_name,
        workers = config.runtime.workers,
        "homecored running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    // Stopping drains the worker pool and joins threads.
    let stopping = Arc::clone(&hub);
    tokio::task::spawn_blocking(move || stopping.stop()).await?;

    for integration in &mut integrations {
        if let Err(err) = integration.teardown() {
            tracing::warn!(integration = integration.name(), error = %err, "teardown failed");
        }
    }

    Ok(())
}
