//! Operational modes for mock channels.
//!
//! - **Instant**: Zero delays, deterministic behavior for unit tests
//! - **Realistic**: Hardware-like attach and I/O timing for integration tests
//! - **Chaos**: Zero delays, meant to be combined with a failure rate

use serde::{Deserialize, Serialize};

/// Operational modes for mock channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Hardware-like timing - for integration tests
    Realistic,
    /// Configurable failures - for resilience testing
    Chaos,
}

impl MockMode {
    /// Whether operations should sleep for their configured delay.
    pub fn simulates_timing(&self) -> bool {
        matches!(self, Self::Realistic)
    }
}
