//! Named resources and their status records.

use phidget_core::{ChannelId, ChannelKind, ChannelReading, DriverResult, HardwareChannel};
use serde::Serialize;
use std::sync::Arc;

/// A logical name bound to one open hardware channel.
///
/// The name and kind are fixed at creation. The channel handle is owned by
/// this resource alone; the registry hands out `Arc<NamedResource>` so callers
/// can drive the channel without holding registry locks.
pub struct NamedResource {
    name: String,
    kind: ChannelKind,
    channel: Arc<dyn HardwareChannel>,
}

impl NamedResource {
    /// Bind `name` to an opened channel.
    pub fn new(name: impl Into<String>, kind: ChannelKind, channel: Arc<dyn HardwareChannel>) -> Self {
        Self {
            name: name.into(),
            kind,
            channel,
        }
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind declared when the resource was created.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Identity of the underlying channel.
    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    /// Underlying channel handle.
    pub fn channel(&self) -> &Arc<dyn HardwareChannel> {
        &self.channel
    }

    /// Drive a digital output.
    pub async fn set_state(&self, state: bool) -> DriverResult<()> {
        self.channel.set_state(state).await
    }

    /// Drive a voltage output.
    pub async fn set_voltage(&self, volts: f64) -> DriverResult<()> {
        self.channel.set_voltage(volts).await
    }

    /// Render the resource as a status record.
    ///
    /// A failed hardware read is reported in the record rather than failing
    /// the whole status listing.
    pub async fn status(&self) -> ResourceStatus {
        let reading = match self.channel.reading().await {
            Ok(ChannelReading::State(state)) => StatusReading::State { state },
            Ok(ChannelReading::Voltage(voltage)) => StatusReading::Voltage { voltage },
            Err(err) => StatusReading::Unavailable {
                error: err.to_string(),
            },
        };
        ResourceStatus {
            name: self.name.clone(),
            kind: self.kind,
            reading,
        }
    }
}

impl std::fmt::Debug for NamedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedResource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("channel", &self.channel.id())
            .finish()
    }
}

/// Status record: `{name, type, state}` or `{name, type, voltage}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceStatus {
    /// Resource name
    pub name: String,
    /// Declared kind, serialized as `type`
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    /// Current value or read error
    #[serde(flatten)]
    pub reading: StatusReading,
}

/// Kind-dependent part of a status record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusReading {
    /// Digital channel state
    State {
        /// Current state
        state: bool,
    },
    /// Voltage output level
    Voltage {
        /// Current level in volts
        voltage: f64,
    },
    /// Read failed
    Unavailable {
        /// Driver error text
        error: String,
    },
}
