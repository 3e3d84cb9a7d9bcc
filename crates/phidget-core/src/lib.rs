//! `phidget-core`
//!
//! Core trait definitions and types shared by every crate in phidget-gateway.
//!
//! ## Layers
//!
//! - **HardwareChannel**: one physical I/O line on a hub (digital output,
//!   voltage output or digital input) with open/close/get/set operations
//! - **HardwareEventSink**: receiver for attach/detach/error/state-change
//!   callbacks raised by a channel
//! - **ChannelFactory**: driver entry point that builds channels for an address
//!
//! ## Key Types
//!
//! - [`ChannelKind`]: the three supported channel classes
//! - [`ChannelAddress`]: (channel index, hub port) pair, including the request sentinels
//! - [`ChannelId`]: process-unique identity of one channel handle
//! - [`DriverError`]: error raised by a hardware adapter
//! - [`GatewayError`]: error raised by the registry and service layers

pub mod capabilities;
pub mod channel;
pub mod error;

pub use capabilities::{ChannelFactory, HardwareChannel, HardwareEventSink};
pub use channel::{
    ChannelAddress, ChannelId, ChannelKind, ChannelReading, ChannelSpec, OUTPUT_VOLTAGE_RANGE,
};
pub use error::{DriverError, DriverErrorKind, DriverResult, GatewayError, GatewayResult};
