//! Error types for the gateway.
//!
//! Two layers of errors exist:
//!
//! - **`DriverError`**: raised by a hardware adapter. Carries the driver type,
//!   a coarse [`DriverErrorKind`] and the device message.
//! - **`GatewayError`**: raised by the registry and service layers. Every
//!   variant maps to exactly one HTTP status in the server's error mapping;
//!   hardware failures wrap the originating `DriverError` as their source.
//!
//! Webhook delivery failures are deliberately not part of `GatewayError`:
//! they are logged by the dispatcher and never reach a caller.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of a [`DriverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Channel did not attach within the open timeout
    Timeout,
    /// Link to the hub or device was lost
    Communication,
    /// Device reported a fault
    Hardware,
    /// Value rejected by the device (out of range, bad address)
    InvalidParameter,
    /// Operation not available for this channel kind
    Unsupported,
    /// Operation requires an attached channel
    NotAttached,
    /// Anything the adapter could not classify
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
            DriverErrorKind::Unsupported => "unsupported",
            DriverErrorKind::NotAttached => "not_attached",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Error raised by a hardware adapter.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver that raised the error
    pub driver_type: String,
    /// Error category
    pub kind: DriverErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl DriverError {
    /// Build an error for `driver_type`.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Result alias for hardware adapter operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

// =============================================================================
// Gateway Errors
// =============================================================================

/// Convenience alias for results using the gateway error type.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Primary error type for registry and service operations.
///
/// # Error Categories
///
/// 1. **Caller errors** - `Validation`, `MissingHardwareAddress`, `NotFound`
///    - The request cannot be satisfied as written
///    - Registry state is never touched
///
/// 2. **Hardware errors** - `HardwareOpen`, `Close`, `Hardware`
///    - The device refused or failed an operation
///    - `HardwareOpen` leaves no partial registry entry behind
///    - `Close` leaves the entry registered, since the channel state is unknown
///
/// 3. **Startup errors** - `Config`
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed, missing or mistyped request field.
    #[error("{0}")]
    Validation(String),

    /// Name is not registered and no usable address was supplied.
    #[error("name not found; channel and hub_port must be set")]
    MissingHardwareAddress {
        /// Requested resource name
        name: String,
    },

    /// Channel failed to attach or the device refused the open.
    #[error("{source}")]
    HardwareOpen {
        /// Requested resource name
        name: String,
        /// Underlying driver failure
        #[source]
        source: DriverError,
    },

    /// Close requested for a name that is not registered.
    #[error("no phidget by that name")]
    NotFound {
        /// Requested resource name
        name: String,
    },

    /// Device failed to close; the resource stays registered.
    #[error("{source}")]
    Close {
        /// Resource name
        name: String,
        /// Underlying driver failure
        #[source]
        source: DriverError,
    },

    /// Device rejected a state or voltage operation on an open resource.
    #[error("{source}")]
    Hardware {
        /// Resource name
        name: String,
        /// Underlying driver failure
        #[source]
        source: DriverError,
    },

    /// Service could not be constructed from its configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Create a validation error from a human-readable reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Resource name the error refers to, if any.
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            Self::MissingHardwareAddress { name }
            | Self::HardwareOpen { name, .. }
            | Self::NotFound { name }
            | Self::Close { name, .. }
            | Self::Hardware { name, .. } => Some(name),
            Self::Validation(_) | Self::Config(_) => None,
        }
    }
}
