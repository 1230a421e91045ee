use anyhow::Result;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::checker::{CheckType, Checker, HttpChecker, TcpChecker};
use super::clock::Clock;
use super::types::{Endpoint, LifelineId, Outcome, ProbeEvent};

/// Monitoring executor - runs one probe and folds its result into an outcome
pub struct MonitoringExecutor {
    http_checker: Arc<dyn Checker>,
    tcp_checker: Arc<dyn Checker>,
}

impl MonitoringExecutor {
    /// Create an executor with the network checkers
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        Ok(Self {
            http_checker: Arc::new(HttpChecker::new(timeout_seconds)?),
            tcp_checker: Arc::new(TcpChecker::new(timeout_seconds)),
        })
    }

    /// Create an executor that sends every endpoint to `checker`
    pub fn with_checker(checker: Arc<dyn Checker>) -> Self {
        Self { http_checker: checker.clone(), tcp_checker: checker }
    }

    /// Probe `endpoint` once.
    ///
    /// Never fails: errors and panics inside the checker become `Outcome::Down`.
    pub async fn execute_check(
        &self,
        lifeline: LifelineId,
        endpoint: &Endpoint,
        clock: &dyn Clock,
    ) -> ProbeEvent {
        let timestamp = clock.now();

        let checker: &dyn Checker = match CheckType::for_target(endpoint.as_str()) {
            CheckType::Http => self.http_checker.as_ref(),
            CheckType::Tcp => self.tcp_checker.as_ref(),
        };

        let checked = AssertUnwindSafe(checker.check(endpoint.as_str())).catch_unwind().await;

        match checked {
            Ok(Ok(reachable)) => ProbeEvent::new(lifeline, endpoint.clone(), Outcome::Up, timestamp)
                .with_latency(reachable.latency_ms)
                .with_status_code(reachable.status_code),
            Ok(Err(e)) => {
                ProbeEvent::new(lifeline, endpoint.clone(), Outcome::down(format!("{e:#}")), timestamp)
            }
            Err(panic) => {
                let error = format!("probe panicked: {}", panic_message(panic.as_ref()));
                tracing::error!(endpoint = %endpoint, lifeline = %lifeline, "{}", error);
                ProbeEvent::new(lifeline, endpoint.clone(), Outcome::down(error), timestamp)
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
