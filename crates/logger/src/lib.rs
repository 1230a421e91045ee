use std::{env::var, fmt, str::FromStr};

use thiserror::Error;
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer,
    filter::EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Environment variable that overrides the configured log format.
pub const FORMAT_ENV: &str = "RUST_LOG_FORMAT";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Error)]
#[error("unknown log format `{0}` (expected `compact` or `json`)")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Initialize the global subscriber with INFO as default level.
pub fn init() -> Result<(), TryInitError> {
    init_with(LevelFilter::INFO, LogFormat::Compact)
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`, `RUST_LOG_FORMAT` over `format`.
/// Returns an error when a global subscriber is already installed.
pub fn init_with(level: LevelFilter, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let (format, rejected) = resolve_format(var(FORMAT_ENV).ok().as_deref(), format);

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()?;

    if let Some(error) = rejected {
        warn!("Ignoring {FORMAT_ENV}, falling back to {format}: {error}");
    }

    Ok(())
}

/// Pick the format from the environment override, if it parses.
fn resolve_format(
    env_value: Option<&str>,
    configured: LogFormat,
) -> (LogFormat, Option<UnknownLogFormat>) {
    match env_value.map(str::parse::<LogFormat>) {
        Some(Ok(format)) => (format, None),
        Some(Err(error)) => (configured, Some(error)),
        None => (configured, None),
    }
}
