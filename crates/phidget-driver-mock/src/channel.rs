//! Simulated hub channel.
//!
//! One [`MockChannel`] stands in for a Phidget22 `DigitalOutput`,
//! `VoltageOutput` or `DigitalInput` object. Channels that target an address
//! outside the hub never attach, so `open` fails with a timeout exactly like a
//! real `openWaitForAttachment` on an empty port.
//!
//! Tests drive hardware-originated events through the `simulate_*` methods,
//! which update the channel and notify the injected event sink.

use crate::common::{ChannelOp, ErrorConfig, MockMode, TimingConfig};
use async_trait::async_trait;
use parking_lot::Mutex;
use phidget_core::{
    ChannelAddress, ChannelId, ChannelKind, ChannelSpec, DriverError, DriverErrorKind,
    DriverResult, HardwareChannel, HardwareEventSink, OUTPUT_VOLTAGE_RANGE,
};
use std::sync::Arc;
use std::time::Duration;

/// Driver type reported in errors raised by mock channels.
pub const DRIVER_TYPE: &str = "mock_hub";

#[derive(Debug, Default)]
struct ChannelState {
    open: bool,
    attached: bool,
    state: bool,
    voltage: f64,
    writes: u64,
}

/// Simulated channel on a [`MockHub`](crate::MockHub).
pub struct MockChannel {
    spec: ChannelSpec,
    /// Whether the address exists on the simulated hub
    present: bool,
    mode: MockMode,
    timing: TimingConfig,
    errors: ErrorConfig,
    sink: Arc<dyn HardwareEventSink>,
    inner: Mutex<ChannelState>,
}

impl MockChannel {
    pub(crate) fn new(
        spec: ChannelSpec,
        present: bool,
        mode: MockMode,
        timing: TimingConfig,
        errors: ErrorConfig,
        sink: Arc<dyn HardwareEventSink>,
    ) -> Self {
        Self {
            spec,
            present,
            mode,
            timing,
            errors,
            sink,
            inner: Mutex::new(ChannelState::default()),
        }
    }

    /// Whether `open` has succeeded and `close` has not been called since.
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Whether the channel is currently attached to its hardware.
    pub fn is_attached(&self) -> bool {
        self.inner.lock().attached
    }

    /// Number of successful state or voltage writes.
    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    /// Flip a digital input and raise a state-change event.
    ///
    /// Returns `Ok(false)` without raising an event when the input already
    /// holds `state`, matching hardware that only reports edges.
    pub fn simulate_state_change(&self, state: bool) -> DriverResult<bool> {
        if self.spec.kind != ChannelKind::DigitalInput {
            return Err(self.unsupported("simulate_state_change"));
        }
        {
            let mut inner = self.inner.lock();
            if !inner.attached {
                return Err(self.not_attached());
            }
            if inner.state == state {
                return Ok(false);
            }
            inner.state = state;
        }
        tracing::debug!(channel = %self.spec.id, state, "Mock input changed");
        self.sink.on_state_changed(self.spec.id, state);
        Ok(true)
    }

    /// Drop the hardware link and raise a detach event.
    pub fn simulate_detach(&self) {
        self.inner.lock().attached = false;
        self.sink.on_detached(self.spec.id);
    }

    /// Restore the hardware link of an open channel and raise an attach event.
    pub fn simulate_attach(&self) {
        {
            let mut inner = self.inner.lock();
            if !inner.open {
                return;
            }
            inner.attached = true;
        }
        self.sink.on_attached(self.spec.id);
    }

    /// Raise an asynchronous driver error event.
    pub fn simulate_error(&self, code: u32, description: &str) {
        self.sink.on_error(self.spec.id, code, description);
    }

    async fn io_delay(&self) {
        if self.mode.simulates_timing() {
            tokio::time::sleep(self.timing.io_delay()).await;
        }
    }

    fn attached_guard(&self) -> DriverResult<()> {
        if self.inner.lock().attached {
            Ok(())
        } else {
            Err(self.not_attached())
        }
    }

    fn not_attached(&self) -> DriverError {
        DriverError::new(
            DRIVER_TYPE,
            DriverErrorKind::NotAttached,
            format!("{} on {} is not attached", self.spec.kind, self.spec.address),
        )
    }

    fn unsupported(&self, operation: &str) -> DriverError {
        DriverError::new(
            DRIVER_TYPE,
            DriverErrorKind::Unsupported,
            format!("{} does not support {}", self.spec.kind, operation),
        )
    }

    fn attach_timeout(&self, timeout: Duration) -> DriverError {
        DriverError::new(
            DRIVER_TYPE,
            DriverErrorKind::Timeout,
            format!(
                "Timed out waiting for attachment on {} after {} ms",
                self.spec.address,
                timeout.as_millis()
            ),
        )
    }
}

#[async_trait]
impl HardwareChannel for MockChannel {
    fn id(&self) -> ChannelId {
        self.spec.id
    }

    fn kind(&self) -> ChannelKind {
        self.spec.kind
    }

    fn address(&self) -> ChannelAddress {
        self.spec.address
    }

    async fn open(&self, timeout: Duration) -> DriverResult<()> {
        self.errors.check(ChannelOp::Open)?;

        if self.inner.lock().open {
            return Ok(());
        }

        let realistic = self.mode.simulates_timing();
        let attach_delay = self.timing.attach_delay();
        if !self.present || (realistic && attach_delay > timeout) {
            if realistic {
                tokio::time::sleep(timeout).await;
            }
            return Err(self.attach_timeout(timeout));
        }
        if realistic {
            tokio::time::sleep(attach_delay).await;
        }

        {
            let mut inner = self.inner.lock();
            inner.open = true;
            inner.attached = true;
        }
        self.sink.on_attached(self.spec.id);
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        self.errors.check(ChannelOp::Close)?;
        let mut inner = self.inner.lock();
        inner.open = false;
        inner.attached = false;
        Ok(())
    }

    async fn state(&self) -> DriverResult<bool> {
        if !self.spec.kind.is_digital() {
            return Err(self.unsupported("state"));
        }
        self.errors.check(ChannelOp::State)?;
        self.attached_guard()?;
        Ok(self.inner.lock().state)
    }

    async fn set_state(&self, state: bool) -> DriverResult<()> {
        if self.spec.kind != ChannelKind::DigitalOutput {
            return Err(self.unsupported("set_state"));
        }
        self.errors.check(ChannelOp::SetState)?;
        self.attached_guard()?;
        self.io_delay().await;

        let mut inner = self.inner.lock();
        inner.state = state;
        inner.writes += 1;
        Ok(())
    }

    async fn voltage(&self) -> DriverResult<f64> {
        if self.spec.kind != ChannelKind::VoltageOutput {
            return Err(self.unsupported("voltage"));
        }
        self.errors.check(ChannelOp::Voltage)?;
        self.attached_guard()?;
        Ok(self.inner.lock().voltage)
    }

    async fn set_voltage(&self, volts: f64) -> DriverResult<()> {
        if self.spec.kind != ChannelKind::VoltageOutput {
            return Err(self.unsupported("set_voltage"));
        }
        if !OUTPUT_VOLTAGE_RANGE.contains(&volts) {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::InvalidParameter,
                format!("Voltage {} V outside range ±10V", volts),
            ));
        }
        self.errors.check(ChannelOp::SetVoltage)?;
        self.attached_guard()?;
        self.io_delay().await;

        let mut inner = self.inner.lock();
        inner.voltage = volts;
        inner.writes += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("spec", &self.spec)
            .field("present", &self.present)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
