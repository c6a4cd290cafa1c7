//! wanwatch agent - WAN connectivity watchdog for an OPNsense appliance
//!
//! The agent periodically checks internet reachability and, once an outage
//! is confirmed, asks the appliance to reboot itself:
//! - Sequential probing of several public endpoints ([`prober`])
//! - Suspect / re-check / reboot state machine ([`escalation`])
//! - OPNsense management API client ([`appliance`])
//! - Environment and `_FILE` configuration ([`config`])
//! - Interruptible waits for clean shutdown ([`shutdown`])
//! - Production wiring from validated settings ([`setup`])

pub mod appliance;
pub mod config;
pub mod escalation;
pub mod prober;
pub mod setup;
pub mod shutdown;

pub use appliance::{ApplianceClient, RebootError, Rebooter};
pub use config::{ConfigError, WatchdogConfig};
pub use escalation::{EscalationState, EscalationTimings, Watchdog};
pub use prober::{ConnectivityProber, Prober, ProbeTarget, Verdict};
pub use setup::{build_watchdog, ApplianceWatchdog};
pub use shutdown::{Shutdown, ShutdownTrigger};
