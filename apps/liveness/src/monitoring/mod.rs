pub mod checker;
pub mod clock;
/// Monitoring engine module - keeps every endpoint under watch
///
/// This module is responsible for:
/// - Probing HTTP/HTTPS/TCP endpoints
/// - Re-queueing each endpoint after a fixed delay, forever
/// - Reporting every result as it is drained
pub mod executor;
pub mod lifeline;
pub mod report;
pub mod scheduler;
mod spawner;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

pub use clock::{Clock, TokioClock};
pub use executor::MonitoringExecutor;
pub use report::{LineReporter, OutputFormat, Reporter};
pub use scheduler::{DEFAULT_RETRY_DELAY, LivenessMonitor, MonitorError, MonitorSummary};
pub use types::{Endpoint, LifelineId, Outcome, ProbeEvent};
