use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Network target probed for reachability, usually a URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Endpoint {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

impl From<String> for Endpoint {
    fn from(target: String) -> Self {
        Self(target)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of an endpoint in the configured list.
///
/// Duplicate endpoints get distinct ids and are monitored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LifelineId(pub usize);

impl fmt::Display for LifelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reachability verdict of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum Outcome {
    Up,
    /// Unreachable, with the error that caused it when one is known
    Down(Option<String>),
}

impl Outcome {
    pub fn down(error: impl Into<String>) -> Self {
        Outcome::Down(Some(error.into()))
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Outcome::Up)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Up => None,
            Outcome::Down(error) => error.as_deref(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Up => write!(f, "is up"),
            Outcome::Down(_) => write!(f, "might be down"),
        }
    }
}

/// Result of one probe, sent from a probe task to the monitor loop
#[derive(Debug, Clone, Serialize)]
pub struct ProbeEvent {
    /// Lifeline this probe belongs to
    pub lifeline: LifelineId,

    /// Endpoint that was probed
    pub endpoint: Endpoint,

    /// Up or down
    pub outcome: Outcome,

    /// When the probe started
    pub timestamp: DateTime<Utc>,

    /// Time until the endpoint answered, if it did
    pub latency_ms: Option<u64>,

    /// HTTP status code (if applicable)
    pub status_code: Option<u16>,
}

impl ProbeEvent {
    pub fn new(
        lifeline: LifelineId,
        endpoint: Endpoint,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { lifeline, endpoint, outcome, timestamp, latency_ms: None, status_code: None }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_status_code(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn is_up(&self) -> bool {
        self.outcome.is_up()
    }
}

/// Renders the status line, e.g. `https://go.dev is up`.
impl fmt::Display for ProbeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.endpoint, self.outcome)
    }
}
