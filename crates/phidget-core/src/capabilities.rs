//! Hardware capability traits.
//!
//! Drivers implement [`ChannelFactory`] and hand out [`HardwareChannel`]
//! handles. Each handle is given a [`HardwareEventSink`] when it is created and
//! reports attach, detach, error and state-change callbacks through it.
//!
//! # Design Philosophy
//!
//! - Channel operations are async (`#[async_trait]`) and take `&self`;
//!   drivers use interior mutability for state
//! - Everything is `Send + Sync` so handles can be shared between HTTP
//!   handlers and driver callback threads
//! - Event sink methods are synchronous and must return quickly; they may be
//!   called from threads that are not part of the async runtime
//!
//! # Example
//!
//! ```rust,ignore
//! let channel = factory.create(spec, dispatcher.clone());
//! channel.open(Duration::from_millis(5000)).await?;
//! channel.set_state(true).await?;
//! ```

use crate::channel::{ChannelAddress, ChannelId, ChannelKind, ChannelReading, ChannelSpec};
use crate::error::DriverResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One physical I/O channel.
///
/// # Contract
/// - `open` blocks until the channel attaches or `timeout` elapses
/// - `close` releases the channel; closing a channel that is not open is a no-op
/// - `state`/`set_state` are valid for digital kinds, `voltage`/`set_voltage`
///   for voltage outputs; other combinations return an `Unsupported` error
#[async_trait]
pub trait HardwareChannel: Send + Sync {
    /// Identity assigned when the handle was created.
    fn id(&self) -> ChannelId;

    /// Declared channel class.
    fn kind(&self) -> ChannelKind;

    /// Hub address the handle targets.
    fn address(&self) -> ChannelAddress;

    /// Open the channel and wait for attachment.
    async fn open(&self, timeout: Duration) -> DriverResult<()>;

    /// Close the channel.
    async fn close(&self) -> DriverResult<()>;

    /// Read the digital state.
    async fn state(&self) -> DriverResult<bool>;

    /// Drive the digital state.
    async fn set_state(&self, state: bool) -> DriverResult<()>;

    /// Read the output voltage.
    async fn voltage(&self) -> DriverResult<f64>;

    /// Drive the output voltage.
    async fn set_voltage(&self, volts: f64) -> DriverResult<()>;

    /// Read whichever value matches the channel kind.
    async fn reading(&self) -> DriverResult<ChannelReading> {
        if self.kind().is_digital() {
            self.state().await.map(ChannelReading::State)
        } else {
            self.voltage().await.map(ChannelReading::Voltage)
        }
    }
}

/// Receiver for hardware-originated callbacks.
pub trait HardwareEventSink: Send + Sync {
    /// The channel attached to its hardware.
    fn on_attached(&self, channel: ChannelId);

    /// The channel lost its hardware (cable pulled, hub reset, ...).
    fn on_detached(&self, channel: ChannelId);

    /// The driver reported an asynchronous error.
    fn on_error(&self, channel: ChannelId, code: u32, description: &str);

    /// A digital input changed state.
    fn on_state_changed(&self, channel: ChannelId, state: bool);
}

/// Driver entry point that builds channel handles.
pub trait ChannelFactory: Send + Sync {
    /// Driver type identifier used in logs and error messages.
    fn driver_type(&self) -> &'static str;

    /// Build an unopened channel handle wired to `sink`.
    fn create(&self, spec: ChannelSpec, sink: Arc<dyn HardwareEventSink>)
        -> Arc<dyn HardwareChannel>;
}
