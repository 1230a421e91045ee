use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, TokioClock};
use super::executor::MonitoringExecutor;
use super::lifeline::{LifelineStats, Lifelines};
use super::report::Reporter;
use super::spawner::{Delivery, TaskSpawner};
use super::types::Endpoint;

/// Delay between receiving a result and re-probing the same endpoint
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Every sender is owned by the loop itself, so this means a bug.
    #[error("result channel closed while {0} lifelines were being monitored")]
    ChannelClosed(usize),
}

/// What the loop did before it was stopped
#[derive(Debug, Clone)]
pub struct MonitorSummary {
    /// Events received and reported
    pub events: u64,
    /// Delayed re-probe tasks spawned
    pub respawns: u64,
    pub lifelines: Vec<LifelineStats>,
}

/// Liveness monitor - probes every endpoint forever.
///
/// Seeding spawns one probe task per endpoint without waiting on any of them.
/// Draining then takes one event at a time from the result channel, reports
/// it and spawns exactly one delayed re-probe for the same lifeline. A new
/// task for a lifeline is only spawned after its previous task delivered, so
/// each lifeline has exactly one task in flight.
pub struct LivenessMonitor<R> {
    lifelines: Arc<Lifelines>,
    executor: Arc<MonitoringExecutor>,
    clock: Arc<dyn Clock>,
    reporter: R,
    retry_delay: Duration,
}

impl<R: Reporter> LivenessMonitor<R> {
    /// Create a new liveness monitor
    pub fn new(endpoints: Vec<Endpoint>, executor: Arc<MonitoringExecutor>, reporter: R) -> Self {
        Self {
            lifelines: Arc::new(Lifelines::new(endpoints)),
            executor,
            clock: Arc::new(TokioClock),
            reporter,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shared view of the per-lifeline counters
    pub fn lifelines(&self) -> Arc<Lifelines> {
        Arc::clone(&self.lifelines)
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Cancellation is checked while waiting for results and before every
    /// respawn. Outstanding tasks are aborted and undrained results dropped on
    /// the way out.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<MonitorSummary, MonitorError> {
        // At most one event per lifeline can be pending, so sends never wait forever
        let (result_tx, mut result_rx) = mpsc::channel::<Delivery>(self.lifelines.len().max(1));

        let mut spawner = TaskSpawner::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.clock),
            Arc::clone(&self.lifelines),
            result_tx,
            shutdown.clone(),
        );

        info!(
            endpoints = self.lifelines.len(),
            retry_delay_ms = self.retry_delay.as_millis() as u64,
            "Seeding liveness monitor"
        );
        for id in self.lifelines.ids() {
            spawner.submit(id, Duration::ZERO);
        }
        if self.lifelines.is_empty() {
            warn!("No endpoints configured, waiting for shutdown");
        }

        let mut events = 0u64;
        let mut respawns = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                delivery = result_rx.recv() => {
                    let Some(Delivery { event, guard }) = delivery else {
                        return Err(MonitorError::ChannelClosed(self.lifelines.len()));
                    };
                    events += 1;

                    self.lifelines.record(event.lifeline, &event.outcome);
                    debug!(
                        endpoint = %event.endpoint,
                        lifeline = %event.lifeline,
                        up = event.is_up(),
                        error = event.outcome.error(),
                        latency_ms = event.latency_ms,
                        "Received probe result"
                    );

                    if let Err(e) = self.reporter.report(&event).await {
                        warn!("Failed to report probe result for {}: {}", event.endpoint, e);
                    }

                    // The lifeline is handed over to the re-probe below
                    drop(guard);

                    if shutdown.is_cancelled() {
                        break;
                    }

                    if spawner.submit(event.lifeline, self.retry_delay) {
                        respawns += 1;
                    }
                }

                Some(joined) = spawner.join_next() => {
                    if let Err(e) = joined {
                        error!("Probe task failed: {}", e);
                    }
                }
            }
        }

        info!(events, outstanding = spawner.outstanding(), "Stopping liveness monitor");
        spawner.shutdown().await;
        // Results still queued are discarded along with their guards
        drop(result_rx);

        Ok(MonitorSummary { events, respawns, lifelines: self.lifelines.snapshot() })
    }
}
