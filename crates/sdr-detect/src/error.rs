//! Error types for device detection

use sdr_model::TransportError;
use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectError {
    /// The transport layer could not be queried
    #[error("failed to enumerate devices via {transport}: {source}")]
    EnumerationFailed {
        transport: String,
        #[source]
        source: TransportError,
    },
}
