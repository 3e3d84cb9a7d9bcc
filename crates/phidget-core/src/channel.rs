//! Channel identity and addressing.
//!
//! A channel is addressed on the hub by `(hub_port, channel)`. Requests use two
//! negative sentinels for the address fields:
//!
//! - `-2` ([`ChannelAddress::USE_EXISTING`]): no address supplied, the caller
//!   expects the name to already be open
//! - `-1` ([`ChannelAddress::UNSPECIFIED`]): the caller explicitly asks for an
//!   error when the name is unknown
//!
//! Any other value is passed to the driver when a new channel is created.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Voltage range accepted by voltage output channels.
pub const OUTPUT_VOLTAGE_RANGE: RangeInclusive<f64> = -10.0..=10.0;

/// Class of hardware channel bound to a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Relay or solid-state digital output
    #[serde(alias = "digital_output", alias = "digital_out")]
    DigitalOutput,
    /// Analog output driven in volts
    #[serde(alias = "voltage_output", alias = "voltage_out")]
    VoltageOutput,
    /// Digital input that reports state changes
    #[serde(alias = "digital_input", alias = "digital_in")]
    DigitalInput,
}

impl ChannelKind {
    /// Name used in status records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DigitalOutput => "DigitalOutput",
            Self::VoltageOutput => "VoltageOutput",
            Self::DigitalInput => "DigitalInput",
        }
    }

    /// Whether the channel reports a boolean state (as opposed to a voltage).
    pub fn is_digital(&self) -> bool {
        matches!(self, Self::DigitalOutput | Self::DigitalInput)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Physical address of a channel on the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelAddress {
    /// Channel index within the hub port
    pub channel: i32,
    /// VINT hub port number
    pub hub_port: i32,
}

impl ChannelAddress {
    /// Sentinel: "force an error if the name is not found".
    pub const UNSPECIFIED: i32 = -1;
    /// Sentinel: "use the existing resource" (default when omitted).
    pub const USE_EXISTING: i32 = -2;

    /// Address from channel index and hub port.
    pub fn new(channel: i32, hub_port: i32) -> Self {
        Self { channel, hub_port }
    }

    /// Address carried by requests that omit both fields.
    pub fn use_existing() -> Self {
        Self::new(Self::USE_EXISTING, Self::USE_EXISTING)
    }

    /// True when either field carries the `-1` sentinel.
    pub fn is_missing(&self) -> bool {
        self.channel == Self::UNSPECIFIED || self.hub_port == Self::UNSPECIFIED
    }
}

impl Default for ChannelAddress {
    fn default() -> Self {
        Self::use_existing()
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hub port {} channel {}", self.hub_port, self.channel)
    }
}

/// Process-unique identity of one channel handle.
///
/// Assigned by the registry when a channel is created and used by event
/// callbacks to refer back to the handle that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Wrap a raw identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// Everything a driver needs to build a channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Identity assigned by the registry
    pub id: ChannelId,
    /// Channel class to build
    pub kind: ChannelKind,
    /// Hub location
    pub address: ChannelAddress,
}

/// Current value of a channel, shaped by its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelReading {
    /// Digital input/output state
    State(bool),
    /// Voltage output level in volts
    Voltage(f64),
}
