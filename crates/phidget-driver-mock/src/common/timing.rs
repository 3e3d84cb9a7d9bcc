//! Timing configuration for realistic mode.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hardware-like delays applied in [`MockMode::Realistic`](super::MockMode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Time from `open` until the channel reports attachment
    pub attach_delay_ms: u64,
    /// Round-trip delay for a single get/set on an attached channel
    pub io_delay_ms: u64,
}

impl TimingConfig {
    /// Timing observed on a VINT hub over USB.
    pub fn vint_hub() -> Self {
        Self {
            attach_delay_ms: 250,
            io_delay_ms: 2,
        }
    }

    /// Attach delay as a `Duration`.
    pub fn attach_delay(&self) -> Duration {
        Duration::from_millis(self.attach_delay_ms)
    }

    /// I/O delay as a `Duration`.
    pub fn io_delay(&self) -> Duration {
        Duration::from_millis(self.io_delay_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::vint_hub()
    }
}
