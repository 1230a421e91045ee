use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::types::ProbeEvent;

/// Shape of the lines written for each event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `<endpoint> is up` / `<endpoint> might be down`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Sink for drained probe events, called once per event in drain order.
#[async_trait::async_trait]
pub trait Reporter: Send {
    async fn report(&mut self, event: &ProbeEvent) -> io::Result<()>;
}

/// Writes one line per event to an async writer.
///
/// A slow sink parks the monitor task rather than a runtime thread.
pub struct LineReporter<W> {
    writer: W,
    format: OutputFormat,
}

impl LineReporter<tokio::io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(tokio::io::stdout(), format)
    }
}

impl<W: AsyncWrite + Unpin + Send> LineReporter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render(&self, event: &ProbeEvent) -> io::Result<Vec<u8>> {
        let mut line = match self.format {
            OutputFormat::Text => event.to_string().into_bytes(),
            OutputFormat::Json => serde_json::to_vec(event)?,
        };
        line.push(b'\n');
        Ok(line)
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> Reporter for LineReporter<W> {
    async fn report(&mut self, event: &ProbeEvent) -> io::Result<()> {
        let line = self.render(event)?;
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }
}
