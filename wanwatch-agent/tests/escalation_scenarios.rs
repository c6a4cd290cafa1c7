//! End-to-end escalation scenarios on tokio's paused clock

use std::time::Duration;
use wanwatch_agent::escalation::{EscalationTimings, SETTLE_DURATION};
use wanwatch_agent::prober::{ConnectivityProber, ProbeTarget, RETRY_DELAY};
use wanwatch_agent::Verdict::{Offline, Online};
use wanwatch_agent::{shutdown, Prober, Verdict};
use wanwatch_devkit::{Event, ScriptedCheck, TestHarness};

fn timings() -> EscalationTimings {
    EscalationTimings {
        poll_interval: Duration::from_secs(30),
        grace_period: Duration::from_secs(60),
        settle_duration: SETTLE_DURATION,
    }
}

#[tokio::test(start_paused = true)]
async fn test_online_polls_at_configured_cadence() {
    let harness = TestHarness::new();
    let timeline = harness
        .run_scenario(&[Online, Online, Online], &[], timings())
        .await;

    assert_eq!(timeline.probe_times(), vec![0, 30, 60]);
    assert_eq!(timeline.reboot_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_during_grace_period_never_reboots() {
    let harness = TestHarness::new();
    let timeline = harness
        .run_scenario(&[Offline, Online, Online], &[], timings())
        .await;

    // probe(fail) -> 60s grace -> probe(ok) -> 30s poll -> probe
    assert_eq!(timeline.probe_times(), vec![0, 60, 90]);
    assert_eq!(timeline.reboot_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_outage_reboots_once_then_settles() {
    let harness = TestHarness::new();
    let timeline = harness
        .run_scenario(&[Offline, Offline, Online], &[true], timings())
        .await;

    assert_eq!(
        timeline.sequence(),
        vec![
            Event::Probe(Offline),
            Event::Probe(Offline),
            Event::Reboot { accepted: true },
            Event::Probe(Online),
        ]
    );
    // probe(fail) @0 -> 60s -> probe(fail) @60 -> reboot @60 -> 300s settle -> 30s poll -> probe @390
    assert_eq!(timeline.probe_times(), vec![0, 60, 390]);
    assert_eq!(timeline.reboot_times(), vec![60]);
}

#[tokio::test(start_paused = true)]
async fn test_no_probe_before_settle_duration_elapses() {
    let harness = TestHarness::new();
    let timeline = harness
        .run_scenario(&[Offline, Offline, Offline, Offline], &[true, true], timings())
        .await;

    let reboot_at = timeline.reboot_times()[0];
    let next_probe = timeline
        .probe_times()
        .into_iter()
        .find(|t| *t > reboot_at)
        .unwrap();
    assert!(next_probe - reboot_at >= SETTLE_DURATION.as_secs());
}

#[tokio::test(start_paused = true)]
async fn test_failed_reboot_skips_settle_and_retries_escalation() {
    let harness = TestHarness::new();
    let timeline = harness
        .run_scenario(&[Offline, Offline, Offline, Offline], &[false, true], timings())
        .await;

    assert_eq!(
        timeline.sequence(),
        vec![
            Event::Probe(Offline),
            Event::Probe(Offline),
            Event::Reboot { accepted: false },
            Event::Probe(Offline),
            Event::Probe(Offline),
            Event::Reboot { accepted: true },
        ]
    );
    // Failed reboot @60 -> 30s poll -> probe @90 -> 60s grace -> probe @150 -> reboot @150
    assert_eq!(timeline.probe_times(), vec![0, 60, 90, 150]);
    assert_eq!(timeline.reboot_times(), vec![60, 150]);
}

#[tokio::test(start_paused = true)]
async fn test_reboot_always_follows_full_grace_period() {
    let harness = TestHarness::new();
    let verdicts = [Online, Offline, Online, Offline, Offline, Online, Offline, Offline];
    let timeline = harness.run_scenario(&verdicts, &[], timings()).await;

    let events = timeline.events();
    for (i, (at, event)) in events.iter().enumerate() {
        if let Event::Reboot { .. } = event {
            let probes: Vec<&(Duration, Event)> = events[..i]
                .iter()
                .filter(|(_, e)| matches!(e, Event::Probe(_)))
                .collect();
            let confirm = probes[probes.len() - 1];
            let suspect = probes[probes.len() - 2];
            assert_eq!(confirm.1, Event::Probe(Offline));
            assert_eq!(suspect.1, Event::Probe(Offline));
            assert_eq!(*at, confirm.0);
            assert!(confirm.0 - suspect.0 >= Duration::from_secs(60));
        }
    }
    assert_eq!(timeline.reboot_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_settle_period() {
    let harness = TestHarness::new();
    let trigger = harness.trigger();
    let watchdog = wanwatch_agent::Watchdog::new(
        harness.prober(&[Offline, Offline, Online]),
        harness.rebooter(&[true]),
        timings(),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(120)).await;
        trigger.fire();
    });

    let start = tokio::time::Instant::now();
    watchdog.run(harness.shutdown()).await;

    assert_eq!(start.elapsed(), Duration::from_secs(120));
    assert_eq!(harness.timeline.probe_times(), vec![0, 60]);
    assert_eq!(harness.timeline.reboot_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_three_failing_targets_then_success() {
    let harness = TestHarness::new();
    let targets: Vec<ProbeTarget> = ["http://a.test/", "http://b.test/", "http://c.test/", "http://d.test/"]
        .into_iter()
        .map(ProbeTarget::new)
        .collect();
    let check = ScriptedCheck::new(
        &["http://a.test/", "http://b.test/", "http://c.test/"],
        harness.timeline.clone(),
    );
    let prober = ConnectivityProber::new(targets, check).unwrap();
    let (_trigger, mut shutdown) = shutdown::channel();

    let verdict = prober.probe(&mut shutdown).await;
    assert_eq!(verdict, Some(Verdict::Online));

    let times: Vec<Duration> = harness.timeline.events().into_iter().map(|(at, _)| at).collect();
    assert_eq!(times, vec![Duration::ZERO, RETRY_DELAY, RETRY_DELAY * 2, RETRY_DELAY * 3]);
    assert_eq!(
        harness.timeline.sequence().last(),
        Some(&Event::Check {
            target: "http://d.test/".to_string(),
            reachable: true,
        })
    );
}
