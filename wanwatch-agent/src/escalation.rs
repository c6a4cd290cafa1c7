//! Escalation loop
//!
//! Turns reachability verdicts into at most one reboot per confirmed outage:
//!
//! ```text
//! RoutinePolling ──offline──▶ SuspectedOffline ──offline──▶ ConfirmedOfflineRebooting
//!   ▲  │ online      (grace period)  │ online                     │ ok          │ error
//!   │  └─(poll)                      ▼                            ▼             │
//!   ├────────────────────────(poll)──┘                 PostRebootRecovery       │
//!   │                                                   (settle, then poll)     │
//!   └───────────────────────────────────────────────────────────────────(poll)──┘
//! ```
//!
//! A reboot is only ever issued after a second probe that ran a full grace
//! period after the first failing one. Every cycle ends with the poll
//! interval before the next routine probe.

use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::appliance::Rebooter;
use crate::prober::{Prober, Verdict};
use crate::shutdown::Shutdown;

/// Pause after a successful reboot so the appliance can come back up
pub const SETTLE_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    RoutinePolling,
    SuspectedOffline,
    ConfirmedOfflineRebooting,
    PostRebootRecovery,
}

impl fmt::Display for EscalationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EscalationState::RoutinePolling => "routine_polling",
            EscalationState::SuspectedOffline => "suspected_offline",
            EscalationState::ConfirmedOfflineRebooting => "confirmed_offline_rebooting",
            EscalationState::PostRebootRecovery => "post_reboot_recovery",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationTimings {
    pub poll_interval: Duration,
    /// Wait between the first offline verdict and the confirmation re-check
    pub grace_period: Duration,
    pub settle_duration: Duration,
}

/// Single owned loop context: collaborators, timings and current state
pub struct Watchdog<P, R> {
    prober: P,
    rebooter: R,
    timings: EscalationTimings,
    state: EscalationState,
    reboots: u64,
}

impl<P: Prober, R: Rebooter> Watchdog<P, R> {
    pub fn new(prober: P, rebooter: R, timings: EscalationTimings) -> Self {
        Self {
            prober,
            rebooter,
            timings,
            state: EscalationState::RoutinePolling,
            reboots: 0,
        }
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// Reboot commands accepted by the appliance so far
    pub fn reboots(&self) -> u64 {
        self.reboots
    }

    /// Run until shutdown is requested
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(
            poll_interval_secs = self.timings.poll_interval.as_secs(),
            grace_period_secs = self.timings.grace_period.as_secs(),
            "Watchdog loop started"
        );

        loop {
            let Some(wait) = self.advance(&mut shutdown).await else {
                break;
            };
            if !shutdown.sleep(wait).await {
                break;
            }
        }

        info!(state = %self.state, reboots = self.reboots, "Watchdog loop stopped");
    }

    /// Execute the current state's action, move to the next state and return
    /// the wait that must elapse before the next call.
    ///
    /// Returns `None` when shutdown interrupted a probe.
    pub async fn advance(&mut self, shutdown: &mut Shutdown) -> Option<Duration> {
        let (next, wait) = match self.state {
            EscalationState::RoutinePolling => match self.prober.probe(shutdown).await? {
                Verdict::Online => {
                    info!("System is online");
                    (EscalationState::RoutinePolling, self.timings.poll_interval)
                }
                Verdict::Offline => {
                    warn!(
                        grace_period_secs = self.timings.grace_period.as_secs(),
                        "Offline, wait for reboot timer"
                    );
                    (EscalationState::SuspectedOffline, self.timings.grace_period)
                }
            },
            EscalationState::SuspectedOffline => match self.prober.probe(shutdown).await? {
                Verdict::Online => {
                    info!("System got back online on its own");
                    (EscalationState::RoutinePolling, self.timings.poll_interval)
                }
                Verdict::Offline => {
                    warn!("Still offline, rebooting");
                    (EscalationState::ConfirmedOfflineRebooting, Duration::ZERO)
                }
            },
            EscalationState::ConfirmedOfflineRebooting => match self.rebooter.reboot().await {
                Ok(()) => {
                    self.reboots += 1;
                    info!(
                        settle_secs = self.timings.settle_duration.as_secs(),
                        "Rebooted, wait until system is started"
                    );
                    (EscalationState::PostRebootRecovery, self.timings.settle_duration)
                }
                Err(e) => {
                    error!(error = %e, "failed to reboot system");
                    (EscalationState::RoutinePolling, self.timings.poll_interval)
                }
            },
            EscalationState::PostRebootRecovery => {
                info!("Settle period over, resuming routine polling");
                (EscalationState::RoutinePolling, self.timings.poll_interval)
            }
        };

        if next != self.state {
            debug!(from = %self.state, to = %next, wait_secs = wait.as_secs(), "State transition");
        }
        self.state = next;
        Some(wait)
    }
}
