use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::monitoring::validation::{validate_endpoint, validate_retry_delay, validate_timeout};
use crate::monitoring::{Endpoint, OutputFormat};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub logging: Logging,
    pub output: Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub endpoints: Vec<String>,
    pub retry_delay_seconds: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub format: OutputFormat,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://google.com".into(),
                "https://facebook.com".into(),
                "https://stackoverflow.com".into(),
                "https://go.dev".into(),
                "https://amazon.com".into(),
            ],
            retry_delay_seconds: 2,
            timeout_seconds: 10,
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/liveness.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/liveness.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Retry Delay (s)", &self.monitor.retry_delay_seconds)?;
        write_1(f, "Timeout (s)", &self.monitor.timeout_seconds)?;
        write_1(f, "Endpoints", &self.monitor.endpoints.len())?;
        for (index, endpoint) in self.monitor.endpoints.iter().enumerate() {
            write_2(f, &format!("#{index}"), endpoint)?;
        }
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;
        write_title_1(f, "Output")?;
        write_1(f, "Format", &self.output.format)?;

        Ok(())
    }
}

/// Where [`Config::from_config`] got its values from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from an existing file
    File(path::PathBuf),
    /// No file existed, so the defaults were written there
    WroteDefault(path::PathBuf),
    /// Built-in defaults, nothing touched on disk
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::WroteDefault(path) => write!(f, "{} (newly written defaults)", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// When the file does not exist and `write_default` is set, a default
    /// config is created in ~/.config/uppe/liveness.toml or the specified
    /// path. Without `write_default` a missing file (or a missing home
    /// directory) falls back to the defaults and nothing is written.
    ///
    /// Runs before logging is initialized; callers log the returned
    /// [`ConfigSource`].
    ///
    /// ```rust,ignore
    /// let (cfg, source) = config::Config::from_config(None::<&path::Path>, true)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(
        optional_path: Option<impl AsRef<path::Path>>,
        write_default: bool,
    ) -> Result<(Self, ConfigSource), ConfigError> {
        let config_path: path::PathBuf = match optional_path {
            Some(path) => normalize_toml_path(path.as_ref()),
            None => match default_config_path() {
                Ok(path) => path,
                Err(_) if !write_default => return Ok((Self::default(), ConfigSource::Defaults)),
                Err(e) => return Err(e),
            },
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            let config = toml::from_str(raw_string.as_str())
                .map_err(|source| ConfigError::ParseFailed { path: config_path.clone(), source })?;
            Ok((config, ConfigSource::File(config_path)))
        } else if write_default {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok((config, ConfigSource::WroteDefault(config_path)))
        } else {
            Ok((Self::default(), ConfigSource::Defaults))
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Check every value the monitor will rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |e: anyhow::Error| ConfigError::Invalid(format!("{e:#}"));

        for endpoint in &self.monitor.endpoints {
            validate_endpoint(endpoint).map_err(invalid)?;
        }
        validate_retry_delay(self.monitor.retry_delay_seconds).map_err(invalid)?;
        validate_timeout(self.monitor.timeout_seconds).map_err(invalid)?;

        self.log_level()?;
        self.log_format()?;

        Ok(())
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.monitor.endpoints.iter().map(|e| Endpoint::from(e.as_str())).collect()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.monitor.retry_delay_seconds)
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        self.logging
            .level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level `{}`", self.logging.level)))
    }

    pub fn log_format(&self) -> Result<logger::LogFormat, ConfigError> {
        self.logging.format.parse().map_err(|e| ConfigError::Invalid(format!("{e}")))
    }
}
