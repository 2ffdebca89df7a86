//! Virtual dongle simulation
//!
//! A virtual dongle applies settings to shared state owned by its
//! [`SimTransport`](crate::SimTransport), so tests can observe exactly what
//! the session layer pushed to "hardware".

use std::sync::{Arc, Mutex};

use sdr_model::{Gain, GainMode, RadioDevice, TransportError, TunerType, UsbId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::{lock, SimInner, SimOp};

/// Configuration for creating a virtual dongle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDongleConfig {
    /// USB manufacturer string
    pub manufacturer: String,
    /// USB product string
    pub product: String,
    /// USB serial number
    pub serial: String,
    /// USB VID/PID
    pub usb_id: Option<UsbId>,
    /// Tuner chip to emulate
    pub tuner: TunerType,
}

impl Default for VirtualDongleConfig {
    fn default() -> Self {
        Self {
            manufacturer: "Realtek".to_string(),
            product: "RTL2838UHIDIR".to_string(),
            serial: "00000001".to_string(),
            usb_id: Some(UsbId::new(0x0BDA, 0x2838)),
            tuner: TunerType::R820T,
        }
    }
}

/// Hardware-side state of a virtual dongle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DongleState {
    /// Currently claimed by a handle (ours or "another process")
    pub open: bool,
    /// Last gain mode applied
    pub gain_mode: Option<GainMode>,
    /// Last gain applied
    pub gain: Option<Gain>,
    /// Last center frequency applied
    pub center_frequency_hz: Option<u64>,
    /// Number of successful opens
    pub open_count: u32,
    /// Number of successful closes
    pub close_count: u32,
}

/// A claimed virtual dongle
#[derive(Debug)]
pub struct VirtualDongle {
    inner: Arc<Mutex<SimInner>>,
    slot_id: u64,
    index: u32,
    tuner: TunerType,
}

impl VirtualDongle {
    pub(crate) fn new(
        inner: Arc<Mutex<SimInner>>,
        slot_id: u64,
        index: u32,
        tuner: TunerType,
    ) -> Self {
        Self {
            inner,
            slot_id,
            index,
            tuner,
        }
    }

    /// Run `apply` against this dongle's state after latency/fault injection
    fn with_state(
        &self,
        op: SimOp,
        apply: impl FnOnce(&mut DongleState),
    ) -> Result<(), TransportError> {
        SimInner::delay(&self.inner);

        let mut inner = lock(&self.inner);
        if let Some(err) = inner.take_fault(op) {
            debug!("Injected {:?} failure on virtual dongle #{}", op, self.index);
            return Err(err);
        }
        let slot = inner
            .slot_mut(self.slot_id)
            .ok_or(TransportError::DeviceNotPresent(self.index))?;
        apply(&mut slot.state);
        Ok(())
    }
}

impl RadioDevice for VirtualDongle {
    fn index(&self) -> u32 {
        self.index
    }

    fn tuner(&self) -> TunerType {
        self.tuner
    }

    fn set_gain_mode(&mut self, mode: GainMode) -> Result<(), TransportError> {
        self.with_state(SimOp::SetGainMode, |s| s.gain_mode = Some(mode))
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), TransportError> {
        self.with_state(SimOp::SetGain, |s| s.gain = Some(gain))
    }

    fn set_center_frequency(&mut self, hz: u64) -> Result<(), TransportError> {
        // librtlsdr takes a u32 center frequency
        if u32::try_from(hz).is_err() {
            return Err(TransportError::Unrepresentable(format!("{} Hz exceeds u32", hz)));
        }
        self.with_state(SimOp::SetFrequency, |s| s.center_frequency_hz = Some(hz))
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        debug!("Closing virtual dongle #{}", self.index);
        self.with_state(SimOp::Close, |s| {
            s.open = false;
            s.close_count += 1;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_adsb_stick() {
        let config = VirtualDongleConfig::default();
        assert_eq!(config.tuner, TunerType::R820T);
        assert_eq!(config.usb_id, Some(UsbId::new(0x0BDA, 0x2838)));
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = VirtualDongleConfig {
            serial: "ADSB1090".to_string(),
            tuner: TunerType::E4000,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: VirtualDongleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
