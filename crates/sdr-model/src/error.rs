//! Error types for capability negotiation and hardware transport

use thiserror::Error;

/// Errors produced while resolving a requested setting against a device's
/// capability table
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapabilityError {
    /// The device reports no discrete gain steps
    #[error("device has no supported gain values")]
    UnsupportedCapability,

    /// Requested frequency lies outside the tuner's range
    #[error("frequency {requested_hz} Hz outside tunable range {min_hz}-{max_hz} Hz")]
    OutOfRange {
        requested_hz: u64,
        min_hz: u64,
        max_hz: u64,
    },

    /// Requested gain is NaN or infinite
    #[error("invalid gain request: {0} dB")]
    InvalidGain(f64),
}

/// Errors reported by a hardware transport backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The driver library could not be loaded
    #[error("librtlsdr not found - install the rtl-sdr package")]
    LibraryNotFound,

    /// No device is attached at this index
    #[error("no device at index {0}")]
    DeviceNotPresent(u32),

    /// Device is claimed by another handle or process
    #[error("device {0} is busy or in use")]
    DeviceBusy(u32),

    /// A driver call returned a failure code
    #[error("{op} failed with error code {code}")]
    OperationFailed { op: String, code: i32 },

    /// Value cannot be expressed in the driver's native units
    #[error("value not representable by driver: {0}")]
    Unrepresentable(String),

    /// Transport could not be queried at all
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}
