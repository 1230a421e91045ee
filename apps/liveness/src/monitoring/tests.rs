/// Scenario tests for the liveness monitor loop
///
/// These drive `LivenessMonitor::run` end to end with scripted checkers and
/// tokio's paused clock:
/// - every seeded endpoint delivers, nothing is lost
/// - re-probes wait for the retry delay
/// - one task per lifeline at any time
/// - shutdown through the cancellation token
use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

use super::checker::{Checker, Reachable};
use super::clock::{Clock, TokioClock};
use super::report::Reporter;
use super::types::{Endpoint, LifelineId, ProbeEvent};
use super::{LivenessMonitor, MonitorSummary, MonitoringExecutor};

/// Checker answering from a fixed script, recording when each target was hit
#[derive(Default)]
struct ScriptedChecker {
    down: HashSet<String>,
    work: Duration,
    calls: Mutex<HashMap<String, Vec<Instant>>>,
    in_flight: Mutex<HashMap<String, usize>>,
    peak_in_flight: Mutex<HashMap<String, usize>>,
}

impl ScriptedChecker {
    fn down_for(targets: &[&str]) -> Self {
        Self { down: targets.iter().map(|t| t.to_string()).collect(), ..Default::default() }
    }

    fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    fn calls(&self, target: &str) -> Vec<Instant> {
        self.calls.lock().unwrap().get(target).cloned().unwrap_or_default()
    }

    fn peak_in_flight(&self, target: &str) -> usize {
        self.peak_in_flight.lock().unwrap().get(target).copied().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Checker for ScriptedChecker {
    async fn check(&self, target: &str) -> Result<Reachable> {
        self.calls.lock().unwrap().entry(target.to_string()).or_default().push(Instant::now());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let active = in_flight.entry(target.to_string()).or_default();
            *active += 1;
            let mut peak = self.peak_in_flight.lock().unwrap();
            let peak = peak.entry(target.to_string()).or_default();
            *peak = (*peak).max(*active);
        }

        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }

        *self.in_flight.lock().unwrap().entry(target.to_string()).or_default() -= 1;

        if self.down.contains(target) {
            Err(anyhow!("connection refused"))
        } else {
            Ok(Reachable { latency_ms: 1, status_code: Some(200) })
        }
    }
}

struct PanickingChecker;

#[async_trait::async_trait]
impl Checker for PanickingChecker {
    async fn check(&self, _target: &str) -> Result<Reachable> {
        panic!("probe blew up")
    }
}

/// Never answers for `hung`, succeeds for everything else
struct HangingChecker;

#[async_trait::async_trait]
impl Checker for HangingChecker {
    async fn check(&self, target: &str) -> Result<Reachable> {
        if target == "hung" {
            std::future::pending::<()>().await;
        }
        Ok(Reachable { latency_ms: 1, status_code: Some(200) })
    }
}

/// Collects every reported event and stops the monitor after `stop_after`
struct CollectingReporter {
    seen: Arc<Mutex<Vec<(Instant, ProbeEvent)>>>,
    stop_after: usize,
    shutdown: CancellationToken,
}

#[async_trait::async_trait]
impl Reporter for CollectingReporter {
    async fn report(&mut self, event: &ProbeEvent) -> io::Result<()> {
        let mut seen = self.seen.lock().unwrap();
        seen.push((Instant::now(), event.clone()));
        if seen.len() >= self.stop_after {
            self.shutdown.cancel();
        }
        Ok(())
    }
}

/// Clock that remembers every delay it was asked to wait
#[derive(Default)]
struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

#[async_trait::async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        TokioClock.sleep(duration).await;
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        TokioClock.now()
    }
}

/// Clock whose sleep blows up, so every delayed task dies before its check
struct PanickingSleepClock;

#[async_trait::async_trait]
impl Clock for PanickingSleepClock {
    async fn sleep(&self, _duration: Duration) {
        panic!("timer wheel gone")
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}

struct Harness {
    seen: Arc<Mutex<Vec<(Instant, ProbeEvent)>>>,
    shutdown: CancellationToken,
}

impl Harness {
    fn lines(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(_, event)| event.to_string()).collect()
    }

    fn events(&self) -> Vec<(Instant, ProbeEvent)> {
        self.seen.lock().unwrap().clone()
    }
}

fn monitor(
    endpoints: &[&str],
    checker: Arc<dyn Checker>,
    retry_delay: Duration,
    stop_after: usize,
) -> (LivenessMonitor<CollectingReporter>, Harness) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let shutdown = CancellationToken::new();
    let reporter =
        CollectingReporter { seen: Arc::clone(&seen), stop_after, shutdown: shutdown.clone() };

    let monitor = LivenessMonitor::new(
        endpoints.iter().map(|e| Endpoint::from(*e)).collect(),
        Arc::new(MonitoringExecutor::with_checker(checker)),
        reporter,
    )
    .with_retry_delay(retry_delay);

    (monitor, Harness { seen, shutdown })
}

async fn run_to_completion(
    monitor: LivenessMonitor<CollectingReporter>,
    harness: &Harness,
) -> MonitorSummary {
    timeout(Duration::from_secs(24 * 3600), monitor.run(harness.shutdown.clone()))
        .await
        .expect("monitor did not stop")
        .expect("monitor failed")
}

#[tokio::test(start_paused = true)]
async fn test_up_and_down_scenario() {
    let checker = Arc::new(ScriptedChecker::down_for(&["b"]));
    let (monitor, harness) = monitor(&["a", "b"], checker, Duration::ZERO, 10);

    let summary = run_to_completion(monitor, &harness).await;

    let lines = harness.lines();
    assert_eq!(lines.len(), 10);
    assert!(lines.iter().all(|line| line == "a is up" || line == "b might be down"), "{lines:?}");
    assert!(lines.iter().any(|line| line == "a is up"));
    assert!(lines.iter().any(|line| line == "b might be down"));

    assert_eq!(summary.events, 10);
    assert_eq!(summary.respawns, 9);
}

#[tokio::test(start_paused = true)]
async fn test_every_seed_delivers_before_first_respawn() {
    let endpoints = ["a", "b", "c", "d", "e"];
    let retry_delay = Duration::from_secs(60);
    let checker = Arc::new(ScriptedChecker::default());
    let (monitor, harness) = monitor(&endpoints, checker, retry_delay, endpoints.len() * 2);

    let start = Instant::now();
    run_to_completion(monitor, &harness).await;

    let events = harness.events();
    let (seeded, respawned) = events.split_at(endpoints.len());
    let all: HashSet<LifelineId> = (0..endpoints.len()).map(LifelineId).collect();

    let seeded_ids: HashSet<LifelineId> = seeded.iter().map(|(_, e)| e.lifeline).collect();
    assert_eq!(seeded_ids, all);
    assert!(seeded.iter().all(|(at, _)| *at < start + retry_delay));

    let respawned_ids: HashSet<LifelineId> = respawned.iter().map(|(_, e)| e.lifeline).collect();
    assert_eq!(respawned_ids, all);
    assert!(respawned.iter().all(|(at, _)| *at >= start + retry_delay));
}

#[tokio::test(start_paused = true)]
async fn test_reprobe_waits_for_retry_delay() {
    let retry_delay = Duration::from_secs(2);
    let checker = Arc::new(ScriptedChecker::default());
    let clock = Arc::new(RecordingClock::default());
    let (monitor, harness) = monitor(&["https://go.dev"], checker.clone(), retry_delay, 4);
    let monitor = monitor.with_clock(clock.clone());

    let summary = run_to_completion(monitor, &harness).await;

    let calls = checker.calls("https://go.dev");
    assert_eq!(calls.len(), 4);
    for pair in calls.windows(2) {
        assert!(pair[1] - pair[0] >= retry_delay, "re-probed after {:?}", pair[1] - pair[0]);
    }

    // Seeds start immediately; each received event schedules one delayed task
    let sleeps = clock.sleeps.lock().unwrap().clone();
    assert_eq!(sleeps, vec![retry_delay; 3]);
    assert_eq!(summary.respawns, 3);
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_per_lifeline() {
    let checker =
        Arc::new(ScriptedChecker::down_for(&["b"]).with_work(Duration::from_millis(250)));
    let (monitor, harness) =
        monitor(&["a", "a", "b"], checker.clone(), Duration::from_millis(100), 60);
    let lifelines = monitor.lifelines();

    let summary = run_to_completion(monitor, &harness).await;

    assert_eq!(summary.events, 60);
    for stats in &summary.lifelines {
        assert_eq!(stats.peak_active, 1, "lifeline {} overlapped", stats.lifeline);
        assert_eq!(stats.active, 0);
        assert!(stats.probes > 0);
    }
    assert_eq!(summary.lifelines, lifelines.snapshot());

    // "a" is configured twice, so two of its probes may legitimately overlap
    assert_eq!(checker.peak_in_flight("b"), 1);
    assert!(checker.peak_in_flight("a") <= 2);

    let b = summary.lifelines.iter().find(|s| s.endpoint == Endpoint::from("b")).unwrap();
    assert_eq!(b.up, 0);
    assert_eq!(b.down, b.probes);
}

#[tokio::test(start_paused = true)]
async fn test_empty_endpoints_block_until_shutdown() {
    let checker = Arc::new(ScriptedChecker::default());
    let (monitor, harness) = monitor(&[], checker.clone(), Duration::ZERO, usize::MAX);

    let shutdown = harness.shutdown.clone();
    let handle = tokio::spawn(monitor.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(!handle.is_finished());

    shutdown.cancel();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.events, 0);
    assert!(summary.lifelines.is_empty());
    assert!(harness.lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_pending_reprobes() {
    let checker = Arc::new(ScriptedChecker::default());
    let (monitor, harness) =
        monitor(&["a", "b"], checker.clone(), Duration::from_secs(3600), usize::MAX);
    let lifelines = monitor.lifelines();

    let shutdown = harness.shutdown.clone();
    let handle = tokio::spawn(monitor.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_secs(10)).await;
    shutdown.cancel();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.events, 2);
    assert_eq!(summary.respawns, 2);
    assert_eq!(checker.calls("a").len(), 1);
    assert_eq!(checker.calls("b").len(), 1);
    assert!(lifelines.snapshot().iter().all(|stats| stats.active == 0));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_probe_keeps_lifeline_alive() {
    let (monitor, harness) = monitor(&["a"], Arc::new(PanickingChecker), Duration::ZERO, 3);

    let summary = run_to_completion(monitor, &harness).await;

    assert_eq!(harness.lines(), vec!["a might be down"; 3]);
    assert_eq!(summary.lifelines[0].down, 3);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_clock_keeps_lifeline_alive() {
    let checker = Arc::new(ScriptedChecker::default());
    let (monitor, harness) = monitor(&["a"], checker.clone(), Duration::from_secs(1), 3);
    let monitor = monitor.with_clock(Arc::new(PanickingSleepClock));

    let summary = run_to_completion(monitor, &harness).await;

    // The seed skips the sleep; every re-check dies in it and is still delivered
    assert_eq!(harness.lines(), vec!["a is up", "a might be down", "a might be down"]);
    let events = harness.events();
    let error = events[1].1.outcome.error().unwrap_or_default();
    assert!(error.contains("panicked"), "{error}");
    assert!(error.contains("timer wheel gone"), "{error}");

    assert_eq!(checker.calls("a").len(), 1);
    assert_eq!(summary.lifelines[0].probes, 3);
    assert_eq!(summary.lifelines[0].active, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_endpoint_does_not_stall_others() {
    let (monitor, harness) =
        monitor(&["hung", "ok"], Arc::new(HangingChecker), Duration::from_secs(1), 5);

    let summary = run_to_completion(monitor, &harness).await;

    assert_eq!(harness.lines(), vec!["ok is up"; 5]);
    let hung = summary.lifelines.iter().find(|s| s.endpoint == Endpoint::from("hung")).unwrap();
    assert_eq!(hung.probes, 0);
    assert_eq!(hung.peak_active, 1);
    assert!(summary.lifelines.iter().all(|stats| stats.active == 0));
}

#[tokio::test(start_paused = true)]
async fn test_reporter_errors_do_not_stop_monitoring() {
    struct FailingReporter {
        calls: usize,
        shutdown: CancellationToken,
    }

    #[async_trait::async_trait]
    impl Reporter for FailingReporter {
        async fn report(&mut self, _event: &ProbeEvent) -> io::Result<()> {
            self.calls += 1;
            if self.calls == 5 {
                self.shutdown.cancel();
            }
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }
    }

    let shutdown = CancellationToken::new();
    let reporter = FailingReporter { calls: 0, shutdown: shutdown.clone() };
    let monitor = LivenessMonitor::new(
        vec![Endpoint::from("a")],
        Arc::new(MonitoringExecutor::with_checker(Arc::new(ScriptedChecker::default()))),
        reporter,
    )
    .with_retry_delay(Duration::from_secs(1));

    let summary = monitor.run(shutdown).await.unwrap();
    assert_eq!(summary.events, 5);
}
