//! Mock Hardware Driver for phidget-gateway
//!
//! This crate provides a simulated VINT hub for running the gateway and its
//! tests without physical hardware. All delays use `tokio::time::sleep`.
//!
//! # Components
//!
//! - [`MockHub`] - [`ChannelFactory`](phidget_core::ChannelFactory) that
//!   builds channels and keeps handles for inspection
//! - [`MockChannel`] - simulated digital output, voltage output or digital
//!   input with `simulate_*` hooks for hardware events
//!
//! # Behavior
//!
//! - Addresses outside the configured hub shape never attach; `open` fails
//!   with a timeout error
//! - Voltage outputs accept -10 V to +10 V
//! - Digital inputs are read-only and report state edges to the event sink
//! - Fault injection ([`ErrorConfig`]) applies to every channel of a hub and
//!   can be configured through [`MockHubConfig::faults`]
//!
//! # Example
//!
//! ```rust,ignore
//! use phidget_driver_mock::{MockHub, MockHubConfig, MockMode};
//!
//! let hub = MockHub::with_config(MockHubConfig {
//!     mode: MockMode::Realistic,
//!     ..Default::default()
//! });
//! ```

mod channel;
pub mod common;
mod hub;

// Re-export common types
pub use common::{ChannelOp, ErrorConfig, ErrorScenario, MockMode, MockRng, TimingConfig};

// Re-export driver types
pub use channel::{MockChannel, DRIVER_TYPE};
pub use hub::{MockHub, MockHubConfig};
