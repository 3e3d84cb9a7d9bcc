//! Gateway configuration using Figment.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults ([`GatewayConfig::default`])
//! 2. An optional TOML file
//! 3. Environment variables prefixed with `PHIDGET_GATEWAY_`, using `__` to
//!    separate nested keys (`PHIDGET_GATEWAY_SERVER__PORT=4100`)
//!
//! Command-line overrides are applied by the binary after loading.
//!
//! # Example
//! ```toml
//! [server]
//! port = 4002
//!
//! [hardware]
//! open_timeout_ms = 5000
//!
//! [[channels]]
//! name = "door"
//! type = "digital_in"
//! channel = 0
//! hub_port = 0
//! webhooks = ["http://localhost:8080/hooks/door"]
//! ```

use crate::logging::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use phidget_core::{ChannelAddress, ChannelKind};
use phidget_driver_mock::MockHubConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "PHIDGET_GATEWAY_";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 4002;

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Top-level gateway configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Hardware driver settings
    pub hardware: HardwareConfig,
    /// Webhook delivery settings
    pub webhooks: WebhookConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Channels opened at startup
    pub channels: Vec<StartupChannel>,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0)
    pub host: String,
    /// Listen port (default: 4002)
    pub port: u16,
    /// Title of the HTML state page
    pub state_page_title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            state_page_title: "Phidgets State".to_string(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which channel factory backs the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareDriver {
    /// Simulated VINT hub
    #[default]
    Mock,
}

/// Hardware configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Channel factory (default: mock)
    pub driver: HardwareDriver,
    /// How long an open waits for attachment (default: 5000)
    pub open_timeout_ms: u64,
    /// Simulated hub shape and behavior
    pub mock: MockHubConfig,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            driver: HardwareDriver::default(),
            open_timeout_ms: 5000,
            mock: MockHubConfig::default(),
        }
    }
}

impl HardwareConfig {
    /// Open timeout as a `Duration`.
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Webhook delivery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Per-delivery timeout (default: 5000)
    pub delivery_timeout_ms: u64,
    /// `User-Agent` header on webhook requests
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: 5000,
            user_agent: concat!("phidget-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl WebhookConfig {
    /// Delivery timeout as a `Duration`.
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact, json)
    pub format: OutputFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Compact,
        }
    }
}

/// A channel to open when the gateway starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupChannel {
    /// Resource name
    pub name: String,
    /// Channel class
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    /// Channel index
    pub channel: i32,
    /// VINT hub port
    pub hub_port: i32,
    /// Subscribers registered after a digital input opens
    #[serde(default)]
    pub webhooks: Vec<String>,
}

impl StartupChannel {
    /// Hub address of the channel.
    pub fn address(&self) -> ChannelAddress {
        ChannelAddress::new(self.channel, self.hub_port)
    }
}

impl GatewayConfig {
    /// Layered configuration sources, without extracting.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(GatewayConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path).extract()?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        if self.hardware.open_timeout_ms == 0 {
            return Err("hardware.open_timeout_ms must be greater than 0".to_string());
        }
        if self.webhooks.delivery_timeout_ms == 0 {
            return Err("webhooks.delivery_timeout_ms must be greater than 0".to_string());
        }
        self.hardware.mock.validate()?;

        let mut names = HashSet::new();
        for channel in &self.channels {
            if channel.name.is_empty() {
                return Err("startup channel name must not be empty".to_string());
            }
            if !names.insert(channel.name.as_str()) {
                return Err(format!("Duplicate startup channel name: {}", channel.name));
            }
            if channel.address().is_missing() {
                return Err(format!(
                    "startup channel '{}' needs a channel and hub_port",
                    channel.name
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use phidget_driver_mock::{ChannelOp, ErrorScenario};

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:4002");
        assert_eq!(config.hardware.open_timeout(), Duration::from_millis(5000));
        assert_eq!(config.webhooks.delivery_timeout(), Duration::from_secs(5));
        assert!(config.channels.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = GatewayConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, GatewayConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "gateway.toml",
                r#"
                [server]
                port = 4100
                state_page_title = "Boiler Room"

                [hardware]
                open_timeout_ms = 1000

                [hardware.mock]
                hub_ports = 2
                mode = "realistic"

                [[hardware.mock.faults]]
                fault = "timeout"
                operation = "close"

                [logging]
                format = "json"

                [[channels]]
                name = "door"
                type = "digital_in"
                channel = 0
                hub_port = 1
                webhooks = ["http://localhost:9000/door"]

                [[channels]]
                name = "circulator"
                type = "DigitalOutput"
                channel = 3
                hub_port = 0
                "#,
            )?;

            let config =
                GatewayConfig::load(Some(Path::new("gateway.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 4100);
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.server.state_page_title, "Boiler Room");
            assert_eq!(config.hardware.open_timeout_ms, 1000);
            assert_eq!(config.hardware.mock.hub_ports, 2);
            assert_eq!(
                config.hardware.mock.faults,
                vec![ErrorScenario::Timeout {
                    operation: ChannelOp::Close
                }]
            );
            assert_eq!(config.logging.format, OutputFormat::Json);
            assert_eq!(config.channels.len(), 2);
            assert_eq!(config.channels[0].kind, ChannelKind::DigitalInput);
            assert_eq!(config.channels[0].address(), ChannelAddress::new(0, 1));
            assert_eq!(config.channels[0].webhooks.len(), 1);
            assert!(config.channels[1].webhooks.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("gateway.toml", "[server]\nport = 4100\n")?;
            jail.set_env("PHIDGET_GATEWAY_SERVER__PORT", "4200");
            jail.set_env("PHIDGET_GATEWAY_LOGGING__LEVEL", "debug");

            let config =
                GatewayConfig::load(Some(Path::new("gateway.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 4200);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = GatewayConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = GatewayConfig::default();
        config.hardware.open_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.webhooks.delivery_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_startup_channels() {
        let channel = StartupChannel {
            name: "pump".to_string(),
            kind: ChannelKind::DigitalOutput,
            channel: 0,
            hub_port: 0,
            webhooks: vec![],
        };
        let config = GatewayConfig {
            channels: vec![channel.clone(), channel],
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.contains("Duplicate startup channel name: pump"));
    }

    #[test]
    fn test_startup_channel_needs_address() {
        let config = GatewayConfig {
            channels: vec![StartupChannel {
                name: "pump".to_string(),
                kind: ChannelKind::DigitalOutput,
                channel: -1,
                hub_port: 0,
                webhooks: vec![],
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_load_error() {
        Jail::expect_with(|jail| {
            jail.create_file("gateway.toml", "[server]\nport = \"not a port\"\n")?;
            let err = GatewayConfig::load(Some(Path::new("gateway.toml"))).unwrap_err();
            assert!(matches!(err, ConfigError::Load(_)));
            Ok(())
        });
    }
}
