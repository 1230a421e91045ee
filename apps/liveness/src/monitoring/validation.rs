//! Validation of monitor settings at load time.
//!
//! The monitor loop itself accepts any non-empty endpoint; these checks only
//! run on configuration so typos fail at startup instead of showing up as an
//! endpoint that is always down.

use anyhow::{Result, anyhow};
use url::Url;

use super::checker::{CheckType, TCP_SCHEME};

/// Longest accepted retry delay (24 hours)
pub const MAX_RETRY_DELAY_SECONDS: u64 = 86400;

/// Validates an endpoint based on its check type
pub fn validate_endpoint(target: &str) -> Result<()> {
    if target.trim().is_empty() {
        return Err(anyhow!("Endpoint must not be empty"));
    }

    match CheckType::for_target(target) {
        CheckType::Http => validate_http_target(target),
        CheckType::Tcp => validate_tcp_target(target),
    }
}

/// Validate HTTP/HTTPS target
fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL {}: {}", target, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Unsupported scheme for {}: {}", target, other)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("URL has no host: {}", target));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(())
}

/// Validate TCP target (`tcp://host:port`)
fn validate_tcp_target(target: &str) -> Result<()> {
    let address = target.strip_prefix(TCP_SCHEME).unwrap_or(target);

    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(anyhow!("TCP target must be in format tcp://host:port"));
    };

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(anyhow!("TCP target has no host: {}", target));
    }

    let port: u16 = port.parse().map_err(|_| anyhow!("Invalid port number in {}", target))?;
    validate_port(port)
}

/// Validate port is in valid range
fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

/// Validate the delay between a result and the next probe of the same endpoint
pub fn validate_retry_delay(delay_seconds: u64) -> Result<()> {
    if delay_seconds > MAX_RETRY_DELAY_SECONDS {
        return Err(anyhow!(
            "Retry delay too long: {} seconds (maximum: {})",
            delay_seconds,
            MAX_RETRY_DELAY_SECONDS
        ));
    }

    Ok(())
}

/// Validate timeout is reasonable
pub fn validate_timeout(timeout_seconds: u64) -> Result<()> {
    const MIN_TIMEOUT: u64 = 1;
    const MAX_TIMEOUT: u64 = 300; // 5 minutes

    if timeout_seconds < MIN_TIMEOUT {
        return Err(anyhow!(
            "Timeout too short: {} seconds (minimum: {})",
            timeout_seconds,
            MIN_TIMEOUT
        ));
    }

    if timeout_seconds > MAX_TIMEOUT {
        return Err(anyhow!(
            "Timeout too long: {} seconds (maximum: {})",
            timeout_seconds,
            MAX_TIMEOUT
        ));
    }

    Ok(())
}
