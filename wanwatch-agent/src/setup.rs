//! Production wiring of the watchdog
//!
//! Configuration is validated before any collaborator is created, so an
//! invalid setting never produces a running loop.

use anyhow::{Context, Result};
use tracing::info;

use crate::appliance::ApplianceClient;
use crate::config::{EnvSource, WatchdogConfig};
use crate::escalation::Watchdog;
use crate::prober::{ConnectivityProber, HttpCheck};

/// Watchdog over real HTTP probes and the OPNsense API
pub type ApplianceWatchdog = Watchdog<ConnectivityProber<HttpCheck>, ApplianceClient>;

pub fn build_watchdog(env: &impl EnvSource) -> Result<ApplianceWatchdog> {
    let config = WatchdogConfig::load(env).context("Failed to load configuration")?;
    let appliance =
        ApplianceClient::new(&config.appliance).context("Failed to create appliance client")?;
    let prober = ConnectivityProber::with_defaults().context("Failed to create prober")?;

    info!(
        appliance = %config.appliance.api_url,
        targets = prober.targets().len(),
        poll_interval_secs = config.poll_interval.as_secs(),
        "Configuration loaded"
    );

    Ok(Watchdog::new(prober, appliance, config.timings()))
}
