//! Uppe liveness monitor.
//!
//! Probes a fixed set of endpoints concurrently and re-probes each one a fixed
//! delay after its previous result was reported, until shut down.

pub mod config;
pub mod monitoring;

pub use config::{Config, ConfigError, ConfigSource};
