//! HTTP client library for phidget-gateway.
//!
//! Thin typed wrapper over the gateway's JSON endpoints, for services that
//! drive actuators or subscribe to inputs from Rust.
//!
//! # Example
//! ```no_run
//! # async fn run() -> phidget_client::Result<()> {
//! use phidget_client::GatewayClient;
//!
//! let client = GatewayClient::new("http://localhost:4002")?;
//! client.set_digital_output("circulator", true, 0, 0).await?;
//! client
//!     .open_digital_input("door", 3, 1, Some("http://localhost:8080/hooks/door"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{ChannelStatus, GatewayClient, DEFAULT_TIMEOUT};
pub use error::{ClientError, Result};
