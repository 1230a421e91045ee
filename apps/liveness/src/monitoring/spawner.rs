use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::clock::Clock;
use super::executor::{MonitoringExecutor, panic_message};
use super::lifeline::{ActiveGuard, Lifelines};
use super::types::{LifelineId, Outcome, ProbeEvent};

/// A probe event plus the responsibility for its lifeline
#[derive(Debug)]
pub(crate) struct Delivery {
    pub event: ProbeEvent,
    pub guard: ActiveGuard,
}

/// Submits probe tasks on behalf of the monitor loop.
///
/// Each submitted task optionally waits, probes its lifeline's endpoint once,
/// sends exactly one [`Delivery`] and ends. A panic anywhere in the task is
/// delivered as `Outcome::Down`, so a lifeline is never left without a task.
pub(crate) struct TaskSpawner {
    executor: Arc<MonitoringExecutor>,
    clock: Arc<dyn Clock>,
    lifelines: Arc<Lifelines>,
    results: mpsc::Sender<Delivery>,
    shutdown: CancellationToken,
    tasks: JoinSet<()>,
}

impl TaskSpawner {
    pub fn new(
        executor: Arc<MonitoringExecutor>,
        clock: Arc<dyn Clock>,
        lifelines: Arc<Lifelines>,
        results: mpsc::Sender<Delivery>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { executor, clock, lifelines, results, shutdown, tasks: JoinSet::new() }
    }

    /// Spawn the next task of lifeline `id`, starting its probe after `delay`.
    ///
    /// Returns false if `id` is not a known lifeline.
    pub fn submit(&mut self, id: LifelineId, delay: Duration) -> bool {
        let (Some(endpoint), Some(guard)) =
            (self.lifelines.endpoint(id).cloned(), self.lifelines.enter(id))
        else {
            warn!(lifeline = %id, "refusing to spawn probe for unknown lifeline");
            return false;
        };

        let executor = Arc::clone(&self.executor);
        let clock = Arc::clone(&self.clock);
        let results = self.results.clone();
        let shutdown = self.shutdown.clone();

        self.tasks.spawn(async move {
            let body = async {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = clock.sleep(delay) => {}
                        _ = shutdown.cancelled() => return None,
                    }
                }
                Some(executor.execute_check(id, &endpoint, clock.as_ref()).await)
            };

            // Whatever happens in the body, the lifeline gets its event
            let event = match AssertUnwindSafe(body).catch_unwind().await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!(endpoint = %endpoint, lifeline = %id, "re-probe abandoned on shutdown");
                    return;
                }
                Err(panic) => {
                    let error = format!("probe task panicked: {}", panic_message(panic.as_ref()));
                    error!(endpoint = %endpoint, lifeline = %id, "{}", error);
                    ProbeEvent::new(id, endpoint.clone(), Outcome::down(error), Utc::now())
                }
            };

            if results.send(Delivery { event, guard }).await.is_err() {
                debug!(endpoint = %endpoint, lifeline = %id, "result channel closed, dropping event");
            }
        });

        true
    }

    /// Wait for the next finished task; `None` when none are outstanding.
    pub async fn join_next(&mut self) -> Option<Result<(), JoinError>> {
        self.tasks.join_next().await
    }

    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// Abort and reap every outstanding task.
    pub async fn shutdown(&mut self) {
        self.tasks.shutdown().await;
    }
}
