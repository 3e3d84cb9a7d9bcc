//! Tracing setup.
//!
//! Structured logging through `tracing-subscriber` with an `EnvFilter`. The
//! `RUST_LOG` environment variable, when set, takes precedence over the
//! configured level.
//!
//! # Example
//! ```no_run
//! use phidget_server::{config::GatewayConfig, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::load(None)?;
//! logging::init_from_config(&config)?;
//! tracing::info!("Gateway starting");
//! # Ok(())
//! # }
//! ```

use crate::config::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-line, colored (for development)
    Pretty,
    /// Single-line, no colors
    #[default]
    Compact,
    /// JSON lines for log aggregation
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Minimum level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Emit span NEW/CLOSE events
    pub with_span_events: bool,
    /// Include source file and line
    pub with_file_and_line: bool,
    /// Include thread names
    pub with_thread_names: bool,
    /// ANSI colors (pretty format only)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Build from the `[logging]` section.
    pub fn from_gateway_config(config: &GatewayConfig) -> Result<Self, String> {
        let level = parse_log_level(&config.logging.level)?;
        Ok(Self::new(level)
            .with_format(config.logging.format)
            .with_ansi(std::io::stdout().is_terminal()))
    }

    /// Defaults at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Toggle ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_span_events(span_events)
            .with_file(self.with_file_and_line)
            .with_line_number(self.with_file_and_line)
            .with_thread_names(self.with_thread_names);

        match self.format {
            OutputFormat::Pretty => layer.pretty().with_ansi(self.with_ansi).boxed(),
            OutputFormat::Compact => layer.compact().with_ansi(false).boxed(),
            OutputFormat::Json => layer.json().boxed(),
        }
    }
}

/// Initialize tracing from gateway configuration.
pub fn init_from_config(config: &GatewayConfig) -> Result<(), String> {
    init(TracingConfig::from_gateway_config(config)?)
}

/// Install the global subscriber.
///
/// Idempotent: if a global subscriber is already set (tests, embedding
/// applications) this returns `Ok(())` and leaves it in place.
pub fn init(config: TracingConfig) -> Result<(), String> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    tracing_subscriber::registry()
        .with(config.fmt_layer().with_filter(env_filter))
        .try_init()
        .map_err(|e| format!("Failed to initialize tracing: {}", e))
}

/// Parse log level string into tracing Level
pub fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Ok(Level::TRACE));
        assert_eq!(parse_log_level("warn"), Ok(Level::WARN));
        assert_eq!(parse_log_level("Debug"), Ok(Level::DEBUG));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_tracing_config_from_gateway_config() {
        let mut config = GatewayConfig::default();
        config.logging.level = "debug".to_string();
        config.logging.format = OutputFormat::Json;

        let tracing_config = TracingConfig::from_gateway_config(&config).unwrap();
        assert_eq!(tracing_config.level, Level::DEBUG);
        assert_eq!(tracing_config.format, OutputFormat::Json);
    }

    #[test]
    fn test_tracing_config_builder() {
        let config = TracingConfig::new(Level::WARN)
            .with_format(OutputFormat::Pretty)
            .with_ansi(false);

        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, OutputFormat::Pretty);
        assert!(!config.with_span_events);
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_init_is_idempotent() {
        assert!(init(TracingConfig::default()).is_ok());
        assert!(init(TracingConfig::new(Level::DEBUG)).is_ok());
    }
}
