use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use uppe_liveness::{Config, ConfigSource};
use uppe_liveness::monitoring::{LineReporter, LivenessMonitor, MonitoringExecutor, OutputFormat};

/// Keep an eye on a set of endpoints and report whether they are up
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/uppe/liveness.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint to monitor, replaces the configured list (repeatable)
    #[arg(short, long = "endpoint", value_name = "URL")]
    endpoints: Vec<String>,

    /// Seconds between a result and the next probe of the same endpoint
    #[arg(long, value_name = "SECONDS")]
    retry_delay: Option<u64>,

    /// Per-probe timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Output format for status lines
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Endpoints given on the command line make the config file optional
    fn writes_default_config(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn apply(&self, config: &mut Config) {
        if !self.endpoints.is_empty() {
            config.monitor.endpoints = self.endpoints.clone();
        }
        if let Some(retry_delay) = self.retry_delay {
            config.monitor.retry_delay_seconds = retry_delay;
        }
        if let Some(timeout) = self.timeout {
            config.monitor.timeout_seconds = timeout;
        }
        if let Some(output) = self.output {
            config.output.format = output;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, source) =
        Config::from_config(cli.config.as_deref(), cli.writes_default_config())?;
    cli.apply(&mut config);
    config.validate()?;

    logger::init_with(config.log_level()?, config.log_format()?)
        .context("failed to initialize logging")?;

    match &source {
        ConfigSource::WroteDefault(path) => {
            info!("Wrote default configuration to {}", path.display())
        }
        source => debug!("Loaded configuration from {}", source),
    }

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    let executor = Arc::new(MonitoringExecutor::new(config.monitor.timeout_seconds)?);
    let reporter = LineReporter::stdout(config.output.format);
    let monitor = LivenessMonitor::new(config.endpoints(), executor, reporter)
        .with_retry_delay(config.retry_delay());

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let summary = monitor.run(shutdown).await?;

    info!(events = summary.events, respawns = summary.respawns, "Liveness monitor stopped");
    for stats in &summary.lifelines {
        info!(
            endpoint = %stats.endpoint,
            lifeline = %stats.lifeline,
            probes = stats.probes,
            up = stats.up,
            down = stats.down,
            "Lifeline summary"
        );
    }

    Ok(())
}

/// Cancel `shutdown` on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_on_signal(shutdown: CancellationToken) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = ctrl_c => match result {
            Ok(()) => info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
        },
        _ = terminate => info!("SIGTERM received, initiating graceful shutdown."),
    }

    shutdown.cancel();
}
