//! Fault injection for mock channels.
//!
//! A hub hands the same [`ErrorConfig`] to every channel it creates, so a
//! latched fault (lost USB link, hardware fault) takes down the whole hub the
//! way a real disconnect does. Faults come from [`ErrorScenario`]s, listed in
//! the hub configuration or set directly by tests, plus an optional uniform
//! random failure rate.

use super::rng::MockRng;
use crate::channel::DRIVER_TYPE;
use parking_lot::Mutex;
use phidget_core::{DriverError, DriverErrorKind, DriverResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Channel operation a fault can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOp {
    /// `open` (attach)
    Open,
    /// `close`
    Close,
    /// Digital read
    State,
    /// Digital write
    SetState,
    /// Voltage read
    Voltage,
    /// Voltage write
    SetVoltage,
}

impl ChannelOp {
    /// Method name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::State => "state",
            Self::SetState => "set_state",
            Self::Voltage => "voltage",
            Self::SetVoltage => "set_voltage",
        }
    }
}

impl fmt::Display for ChannelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One injected fault.
///
/// In TOML each entry is tagged by `fault`:
///
/// ```toml
/// [[hardware.mock.faults]]
/// fault = "timeout"
/// operation = "close"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum ErrorScenario {
    /// `count` calls of `operation` succeed, every later call fails
    FailAfterN {
        /// Targeted operation
        operation: ChannelOp,
        /// Calls that succeed first
        count: u32,
    },
    /// Every call of `operation` times out
    Timeout {
        /// Targeted operation
        operation: ChannelOp,
    },
    /// The hub link drops on the first operation and stays down
    CommunicationLoss,
    /// The hub reports `code` on the first operation and stays faulted
    HardwareFault {
        /// Fault code in error messages
        code: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latched {
    LinkLost,
    Fault(u32),
}

impl Latched {
    fn error(self) -> DriverError {
        match self {
            Self::LinkLost => DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Communication,
                "Communication lost",
            ),
            Self::Fault(code) => DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Hardware,
                format!("Hardware fault: {}", code),
            ),
        }
    }
}

#[derive(Debug, Default)]
struct FaultState {
    calls: HashMap<ChannelOp, u32>,
    latched: Option<Latched>,
}

/// Fault injection shared by every channel of a hub.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    scenarios: Arc<[ErrorScenario]>,
    failure_rate: f64,
    rng: Arc<MockRng>,
    state: Arc<Mutex<FaultState>>,
}

impl ErrorConfig {
    /// Scenarios plus a uniform failure rate; `seed` makes the random
    /// failures reproducible.
    pub fn new(scenarios: Vec<ErrorScenario>, failure_rate: f64, seed: Option<u64>) -> Self {
        Self {
            scenarios: scenarios.into(),
            failure_rate,
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(FaultState::default())),
        }
    }

    /// No faults.
    pub fn none() -> Self {
        Self::new(Vec::new(), 0.0, None)
    }

    /// A single scenario.
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::new(vec![scenario], 0.0, None)
    }

    /// Whether any fault can fire.
    pub fn is_active(&self) -> bool {
        !self.scenarios.is_empty() || self.failure_rate > 0.0
    }

    /// Decide whether `op` fails.
    pub fn check(&self, op: ChannelOp) -> DriverResult<()> {
        let mut state = self.state.lock();
        if let Some(latched) = state.latched {
            return Err(latched.error());
        }

        for scenario in self.scenarios.iter() {
            match *scenario {
                ErrorScenario::FailAfterN { operation, count } if operation == op => {
                    let calls = state.calls.entry(op).or_insert(0);
                    *calls += 1;
                    if *calls > count {
                        return Err(DriverError::new(
                            DRIVER_TYPE,
                            DriverErrorKind::Hardware,
                            format!("Injected {} failure after {} calls", op, count),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation } if operation == op => {
                    return Err(DriverError::new(
                        DRIVER_TYPE,
                        DriverErrorKind::Timeout,
                        format!("Operation '{}' timed out", op),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.latched = Some(Latched::LinkLost);
                    return Err(Latched::LinkLost.error());
                }
                ErrorScenario::HardwareFault { code } => {
                    state.latched = Some(Latched::Fault(code));
                    return Err(Latched::Fault(code).error());
                }
                _ => {}
            }
        }
        drop(state);

        if self.rng.should_fail(self.failure_rate) {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Hardware,
                format!("Random failure on {}", op),
            ));
        }
        Ok(())
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}
