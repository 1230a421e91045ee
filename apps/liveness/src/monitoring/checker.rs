use anyhow::{Result, anyhow};
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Scheme prefix selecting the TCP checker
pub const TCP_SCHEME: &str = "tcp://";

/// Type of check to perform, derived from the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    Http,
    Tcp,
}

impl CheckType {
    /// `tcp://host:port` is a TCP connect, everything else goes through HTTP.
    pub fn for_target(target: &str) -> Self {
        if target.starts_with(TCP_SCHEME) { CheckType::Tcp } else { CheckType::Http }
    }
}

/// The endpoint answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachable {
    pub latency_ms: u64,
    pub status_code: Option<u16>,
}

/// Checker trait for different types of reachability checks.
///
/// One call is one outbound attempt. Implementations own their timeout and
/// never retry.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, target: &str) -> Result<Reachable>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str) -> Result<Reachable> {
        let start = Instant::now();

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        // Any response means the endpoint is reachable, whatever the status
        Ok(Reachable {
            latency_ms: start.elapsed().as_millis() as u64,
            status_code: Some(response.status().as_u16()),
        })
    }
}

/// TCP port checker
pub struct TcpChecker {
    timeout_duration: Duration,
}

impl TcpChecker {
    pub fn new(timeout_seconds: u64) -> Self {
        Self { timeout_duration: Duration::from_secs(timeout_seconds) }
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, target: &str) -> Result<Reachable> {
        let address = target.strip_prefix(TCP_SCHEME).unwrap_or(target);
        let start = Instant::now();

        let connect = tokio::net::TcpStream::connect(address);

        timeout(self.timeout_duration, connect)
            .await
            .map_err(|_| anyhow!("TCP connection timeout"))?
            .map_err(|e| anyhow!("TCP connection failed: {}", e))?;

        Ok(Reachable { latency_ms: start.elapsed().as_millis() as u64, status_code: None })
    }
}
