//! Common infrastructure for mock channels.
//!
//! - **mode**: Operational modes (Instant, Realistic, Chaos)
//! - **timing**: Hardware-like attach and I/O delays
//! - **errors**: Fault injection shared by the channels of one hub
//! - **rng**: Seeded random number generator

pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

// Re-export commonly used types
pub use errors::{ChannelOp, ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;
