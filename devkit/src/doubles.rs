/*!
Scripted collaborators for the watchdog

Each double records what it was asked to do on a shared `Timeline`.
*/

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use wanwatch_agent::prober::{ProbeError, ProbeTarget, Prober, ReachabilityCheck, Verdict};
use wanwatch_agent::shutdown::{Shutdown, ShutdownTrigger};
use wanwatch_agent::{RebootError, Rebooter};

use crate::test_utils::{Event, Timeline};

/// Prober that replays a fixed list of verdicts.
///
/// Once the list is used up it fires shutdown and reports an interrupted
/// probe, which ends `Watchdog::run`.
pub struct ScriptedProber {
    verdicts: Mutex<VecDeque<Verdict>>,
    timeline: Timeline,
    trigger: ShutdownTrigger,
}

impl ScriptedProber {
    pub fn new(verdicts: &[Verdict], timeline: Timeline, trigger: ShutdownTrigger) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.iter().copied().collect()),
            timeline,
            trigger,
        }
    }

    pub fn remaining(&self) -> usize {
        self.verdicts.lock().unwrap().len()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _shutdown: &mut Shutdown) -> Option<Verdict> {
        let next = self.verdicts.lock().unwrap().pop_front();
        match next {
            Some(verdict) => {
                self.timeline.record(Event::Probe(verdict));
                Some(verdict)
            }
            None => {
                self.trigger.fire();
                None
            }
        }
    }
}

/// Rebooter that answers with scripted outcomes (`true` = accepted)
pub struct RecordingRebooter {
    outcomes: Mutex<VecDeque<bool>>,
    timeline: Timeline,
}

impl RecordingRebooter {
    pub fn new(outcomes: &[bool], timeline: Timeline) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            timeline,
        }
    }
}

#[async_trait]
impl Rebooter for RecordingRebooter {
    async fn reboot(&self) -> Result<(), RebootError> {
        let accepted = self.outcomes.lock().unwrap().pop_front().unwrap_or(true);
        self.timeline.record(Event::Reboot { accepted });

        if accepted {
            Ok(())
        } else {
            Err(RebootError::UnexpectedStatus("scripted failure".to_string()))
        }
    }
}

/// Reachability check that fails every target listed in `unreachable`
pub struct ScriptedCheck {
    unreachable: Vec<String>,
    timeline: Timeline,
}

impl ScriptedCheck {
    pub fn new(unreachable: &[&str], timeline: Timeline) -> Self {
        Self {
            unreachable: unreachable.iter().map(|s| s.to_string()).collect(),
            timeline,
        }
    }
}

#[async_trait]
impl ReachabilityCheck for ScriptedCheck {
    async fn check(&self, target: &ProbeTarget) -> Result<(), ProbeError> {
        let reachable = !self.unreachable.iter().any(|u| u == target.url());
        self.timeline.record(Event::Check {
            target: target.url().to_string(),
            reachable,
        });

        if reachable {
            Ok(())
        } else {
            Err(ProbeError::Unreachable {
                target: target.to_string(),
                reason: "scripted outage".to_string(),
            })
        }
    }
}
