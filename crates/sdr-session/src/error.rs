//! Error types for the session manager

use sdr_detect::DetectError;
use sdr_model::{CapabilityError, TransportError};
use thiserror::Error;

/// Errors that can occur while managing a radio session
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// Index is not present in the most recent device listing
    #[error("no device at index {0} in the latest listing")]
    DeviceNotFound(u32),

    /// A session is already open
    #[error("device {open} is already open; close it before opening device {requested}")]
    DeviceBusy {
        /// Index the caller asked for
        requested: u32,
        /// Index of the session already held
        open: u32,
    },

    /// Operation requires an open session
    #[error("no active session")]
    NoActiveSession,

    /// Requested setting could not be negotiated
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// The driver did not answer in time
    #[error("{op} timed out after {timeout_ms}ms")]
    HardwareTimeout {
        /// Operation that stalled
        op: &'static str,
        /// Configured limit (milliseconds)
        timeout_ms: u64,
    },

    /// The driver reported a failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Device enumeration failed
    #[error(transparent)]
    Enumeration(#[from] DetectError),

    /// The blocking worker running a driver call panicked or was cancelled
    #[error("hardware task failed: {0}")]
    TaskFailed(String),
}
