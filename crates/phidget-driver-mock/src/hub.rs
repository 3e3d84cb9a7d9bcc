//! Simulated VINT hub.
//!
//! [`MockHub`] is the [`ChannelFactory`] used when no physical hub is present.
//! It builds [`MockChannel`]s and keeps a weak handle to each one so tests
//! can inspect channel state and inject hardware events while the gateway
//! owns the channel. Channels the gateway dropped (failed opens, closed
//! names) are pruned, so a long-running hub only tracks live channels.

use crate::channel::{MockChannel, DRIVER_TYPE};
use crate::common::{ErrorConfig, ErrorScenario, MockMode, TimingConfig};
use parking_lot::Mutex;
use phidget_core::{
    ChannelAddress, ChannelFactory, ChannelId, ChannelSpec, HardwareChannel, HardwareEventSink,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Configuration for the simulated hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockHubConfig {
    /// Number of VINT ports on the hub (default: 6)
    pub hub_ports: u32,
    /// Channels available behind each port (default: 16)
    pub channels_per_port: u32,
    /// Timing mode (default: instant)
    pub mode: MockMode,
    /// Delays applied in realistic mode
    pub timing: TimingConfig,
    /// Probability that any channel operation fails (default: 0.0)
    pub failure_rate: f64,
    /// Seed for the failure RNG; random when absent
    pub seed: Option<u64>,
    /// Injected faults applied to every channel
    pub faults: Vec<ErrorScenario>,
}

impl Default for MockHubConfig {
    fn default() -> Self {
        Self {
            hub_ports: 6,
            channels_per_port: 16,
            mode: MockMode::default(),
            timing: TimingConfig::default(),
            failure_rate: 0.0,
            seed: None,
            faults: Vec::new(),
        }
    }
}

impl MockHubConfig {
    /// Whether `address` names a channel that exists on this hub.
    pub fn contains(&self, address: ChannelAddress) -> bool {
        let in_range = |value: i32, limit: u32| u32::try_from(value).is_ok_and(|v| v < limit);
        in_range(address.hub_port, self.hub_ports)
            && in_range(address.channel, self.channels_per_port)
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.hub_ports == 0 || self.channels_per_port == 0 {
            return Err("mock hub must expose at least one port and one channel".to_string());
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(format!(
                "failure_rate {} must be between 0.0 and 1.0",
                self.failure_rate
            ));
        }
        Ok(())
    }
}

/// Simulated hub that builds [`MockChannel`]s.
///
/// # Example
///
/// ```rust,ignore
/// let hub = Arc::new(MockHub::new());
/// let service = GatewayService::new(config, hub.clone())?;
/// // ... open "door" through the service ...
/// hub.channel_at(ChannelAddress::new(0, 0)).unwrap().simulate_state_change(true)?;
/// ```
pub struct MockHub {
    config: MockHubConfig,
    errors: ErrorConfig,
    channels: Mutex<Vec<Weak<MockChannel>>>,
    created: AtomicUsize,
}

impl MockHub {
    /// Create a hub with the default 6-port layout.
    pub fn new() -> Self {
        Self::with_config(MockHubConfig::default())
    }

    /// Create a hub from configuration.
    pub fn with_config(config: MockHubConfig) -> Self {
        let errors = ErrorConfig::new(config.faults.clone(), config.failure_rate, config.seed);
        if errors.is_active() {
            tracing::info!(
                faults = config.faults.len(),
                failure_rate = config.failure_rate,
                "Mock hub fault injection enabled"
            );
        }
        Self {
            config,
            errors,
            channels: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Replace the error injection used by channels created from now on.
    pub fn with_errors(mut self, errors: ErrorConfig) -> Self {
        self.errors = errors;
        self
    }

    /// Number of channel handles created so far, including dropped ones.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of created channels somebody still holds.
    pub fn live_count(&self) -> usize {
        self.channels
            .lock()
            .iter()
            .filter(|channel| channel.strong_count() > 0)
            .count()
    }

    /// Look up a live channel by identity.
    pub fn channel(&self, id: ChannelId) -> Option<Arc<MockChannel>> {
        self.channels
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .find(|channel| channel.id() == id)
    }

    /// Most recently created live channel targeting `address`.
    pub fn channel_at(&self, address: ChannelAddress) -> Option<Arc<MockChannel>> {
        self.channels
            .lock()
            .iter()
            .rev()
            .filter_map(Weak::upgrade)
            .find(|channel| channel.address() == address)
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelFactory for MockHub {
    fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn create(
        &self,
        spec: ChannelSpec,
        sink: Arc<dyn HardwareEventSink>,
    ) -> Arc<dyn HardwareChannel> {
        let present = self.config.contains(spec.address);
        tracing::debug!(
            channel = %spec.id,
            kind = %spec.kind,
            address = %spec.address,
            present,
            "Creating mock channel"
        );
        let channel = Arc::new(MockChannel::new(
            spec,
            present,
            self.config.mode,
            self.config.timing,
            self.errors.clone(),
            sink,
        ));
        self.created.fetch_add(1, Ordering::Relaxed);
        let mut channels = self.channels.lock();
        channels.retain(|tracked| tracked.strong_count() > 0);
        channels.push(Arc::downgrade(&channel));
        drop(channels);
        channel
    }
}
