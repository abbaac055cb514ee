//! # Salvo Sim
//!
//! Headless run of the audio scheduler against a simulated engine and game
//! loop. Plays a scripted match timeline (effect bursts, a pool of grunts,
//! a commentary sequence, a pause, a commentary toggle and a line whose
//! completion never arrives) so the scheduler's decisions can be followed in
//! the logs. Prints a final JSON report on stdout.
//!
//! Usage: `salvo-sim [config.toml]` (defaults to `salvo-sim.toml`).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod backend;
mod config;
mod scenario;
mod timing;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::SimConfig;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("salvo=info".parse()?))
        .init();

    info!("Salvo sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::CONFIG_FILE.to_string());
    let config = SimConfig::load_from(&path);

    let report = scenario::run(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Salvo sim finished after {} frames", report.frames);
    Ok(())
}
