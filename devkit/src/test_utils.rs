/*!
Test harness for the watchdog loop

Wires scripted collaborators into a real `Watchdog`, runs it on tokio's
paused clock and returns what happened, and when:
- Every probe verdict and reboot attempt lands on a shared `Timeline`
- The run ends once the scripted verdicts are used up
*/

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;
use wanwatch_agent::escalation::EscalationTimings;
use wanwatch_agent::shutdown::{self, Shutdown, ShutdownTrigger};
use wanwatch_agent::{Verdict, Watchdog};

use crate::doubles::{RecordingRebooter, ScriptedProber};

/// Something a collaborator observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Probe(Verdict),
    Reboot { accepted: bool },
    Check { target: String, reachable: bool },
}

/// Ordered record of events, timestamped from harness creation
#[derive(Debug, Clone)]
pub struct Timeline {
    start: Instant,
    events: Arc<Mutex<Vec<(Duration, Event)>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, event: Event) {
        let at = self.start.elapsed();
        tracing::debug!(?event, at_secs = at.as_secs(), "Recorded event");
        self.events.lock().unwrap().push((at, event));
    }

    pub fn events(&self) -> Vec<(Duration, Event)> {
        self.events.lock().unwrap().clone()
    }

    /// Timestamps (in whole seconds) of every probe verdict
    pub fn probe_times(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter(|(_, e)| matches!(e, Event::Probe(_)))
            .map(|(at, _)| at.as_secs())
            .collect()
    }

    /// Timestamps (in whole seconds) of every reboot attempt
    pub fn reboot_times(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter(|(_, e)| matches!(e, Event::Reboot { .. }))
            .map(|(at, _)| at.as_secs())
            .collect()
    }

    pub fn reboot_count(&self) -> usize {
        self.reboot_times().len()
    }

    /// Events without timestamps, for order-only assertions
    pub fn sequence(&self) -> Vec<Event> {
        self.events().into_iter().map(|(_, e)| e).collect()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete harness for escalation scenarios
pub struct TestHarness {
    pub timeline: Timeline,
    trigger: ShutdownTrigger,
    shutdown: Shutdown,
}

impl TestHarness {
    /// Create the harness. Call from inside a (preferably paused) tokio runtime.
    pub fn new() -> Self {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .try_init()
            .ok();

        let (trigger, shutdown) = shutdown::channel();
        Self {
            timeline: Timeline::new(),
            trigger,
            shutdown,
        }
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Prober answering `verdicts` in order, then stopping the run
    pub fn prober(&self, verdicts: &[Verdict]) -> ScriptedProber {
        ScriptedProber::new(verdicts, self.timeline.clone(), self.trigger())
    }

    /// Rebooter answering `outcomes` in order, accepting once they run out
    pub fn rebooter(&self, outcomes: &[bool]) -> RecordingRebooter {
        RecordingRebooter::new(outcomes, self.timeline.clone())
    }

    /// Run a full watchdog loop until the scripted verdicts are exhausted
    pub async fn run_scenario(
        &self,
        verdicts: &[Verdict],
        reboot_outcomes: &[bool],
        timings: EscalationTimings,
    ) -> Timeline {
        let watchdog = Watchdog::new(self.prober(verdicts), self.rebooter(reboot_outcomes), timings);
        watchdog.run(self.shutdown()).await;
        self.timeline.clone()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeline_records_elapsed_time() {
        let timeline = Timeline::new();
        timeline.record(Event::Probe(Verdict::Online));
        tokio::time::sleep(Duration::from_secs(30)).await;
        timeline.record(Event::Reboot { accepted: true });

        assert_eq!(timeline.probe_times(), vec![0]);
        assert_eq!(timeline.reboot_times(), vec![30]);
        assert_eq!(
            timeline.sequence(),
            vec![Event::Probe(Verdict::Online), Event::Reboot { accepted: true }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_harness_stops_when_script_runs_out() {
        let harness = TestHarness::new();
        let timings = EscalationTimings {
            poll_interval: Duration::from_secs(10),
            grace_period: Duration::from_secs(20),
            settle_duration: Duration::from_secs(40),
        };

        let timeline = harness
            .run_scenario(&[Verdict::Online, Verdict::Online], &[], timings)
            .await;

        assert_eq!(timeline.probe_times(), vec![0, 10]);
        assert!(harness.shutdown().is_triggered());
    }
}
