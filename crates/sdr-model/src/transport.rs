//! Hardware transport seam
//!
//! The session layer never talks to USB directly. A backend implements
//! [`RadioTransport`] to enumerate and open devices, and hands back a
//! [`RadioDevice`] for each claimed receiver. Real hardware (librtlsdr) and
//! simulated dongles both plug in here.
//!
//! All methods are blocking: they may perform USB round-trips and can stall
//! if the hardware wedges. Callers are expected to run them off the async
//! executor and bound them with a timeout.

use crate::descriptor::DeviceInfo;
use crate::error::TransportError;
use crate::gain::Gain;
use crate::tuner::TunerType;

/// Tuner gain control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GainMode {
    /// Driver/hardware automatic gain control
    Auto,
    /// Gain is set explicitly from the tuner's table
    Manual,
}

/// Enumerates and opens radios
pub trait RadioTransport: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// List currently attached devices
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, TransportError>;

    /// Claim the device at `index`
    fn open(&self, index: u32) -> Result<Box<dyn RadioDevice>, TransportError>;
}

/// An exclusively claimed receiver
pub trait RadioDevice: Send {
    /// Enumeration index this handle was opened with
    fn index(&self) -> u32;

    /// Tuner chip as identified on the open handle
    fn tuner(&self) -> TunerType;

    /// Select automatic or manual tuner gain
    fn set_gain_mode(&mut self, mode: GainMode) -> Result<(), TransportError>;

    /// Apply a gain step (manual mode)
    fn set_gain(&mut self, gain: Gain) -> Result<(), TransportError>;

    /// Tune the center frequency
    fn set_center_frequency(&mut self, hz: u64) -> Result<(), TransportError>;

    /// Release the hardware handle
    fn close(self: Box<Self>) -> Result<(), TransportError>;
}
