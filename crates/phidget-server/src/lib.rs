//! Gateway server for phidget-gateway.
//!
//! Ties the hardware layer to the outside world:
//!
//! - [`config`] - layered Figment configuration
//! - [`logging`] - tracing subscriber setup
//! - [`service`] - [`GatewayService`], the owner of all registries
//! - [`http`] - axum routes, handlers and error mapping

pub mod config;
pub mod http;
pub mod logging;
pub mod service;

pub use config::{ConfigError, GatewayConfig, HardwareDriver, StartupChannel};
pub use http::{create_router, serve};
pub use service::GatewayService;
