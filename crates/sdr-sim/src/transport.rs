//! Simulated USB bus of virtual dongles
//!
//! [`SimTransport`] is cheaply cloneable; clones share one bus, so a test can
//! hand one clone to the code under test and keep another to hot-plug
//! dongles, inject faults and inspect what was applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use sdr_model::{DeviceInfo, RadioDevice, RadioTransport, TransportError, TunerType};
use tracing::{debug, info};

use crate::dongle::{DongleState, VirtualDongle, VirtualDongleConfig};

/// Operations that can be delayed or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    Open,
    SetGainMode,
    SetGain,
    SetFrequency,
    Close,
}

#[derive(Debug)]
pub(crate) struct Slot {
    id: u64,
    config: VirtualDongleConfig,
    pub(crate) state: DongleState,
}

#[derive(Debug, Default)]
pub(crate) struct SimInner {
    slots: Vec<Slot>,
    next_id: u64,
    enumeration_error: Option<TransportError>,
    faults: Vec<(SimOp, TransportError)>,
    latency: Duration,
    hide_tuner_while_open: bool,
}

impl SimInner {
    pub(crate) fn slot_mut(&mut self, id: u64) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.id == id)
    }

    /// Remove and return the first pending fault for `op`
    pub(crate) fn take_fault(&mut self, op: SimOp) -> Option<TransportError> {
        let pos = self.faults.iter().position(|(o, _)| *o == op)?;
        Some(self.faults.remove(pos).1)
    }

    /// Sleep for the configured latency without holding the bus lock
    pub(crate) fn delay(inner: &Mutex<SimInner>) {
        let latency = lock(inner).latency;
        if !latency.is_zero() {
            thread::sleep(latency);
        }
    }
}

pub(crate) fn lock(inner: &Mutex<SimInner>) -> MutexGuard<'_, SimInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated transport with hot-pluggable dongles
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    inner: Arc<Mutex<SimInner>>,
}

impl SimTransport {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus with the given dongles attached in order
    pub fn with_dongles(configs: impl IntoIterator<Item = VirtualDongleConfig>) -> Self {
        let sim = Self::new();
        for config in configs {
            sim.attach(config);
        }
        sim
    }

    /// Plug in a dongle; returns its enumeration index
    pub fn attach(&self, config: VirtualDongleConfig) -> u32 {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        info!(
            "Attached virtual dongle {} ({:?}, serial {})",
            id, config.tuner, config.serial
        );
        inner.slots.push(Slot {
            id,
            config,
            state: DongleState::default(),
        });
        (inner.slots.len() - 1) as u32
    }

    /// Unplug the dongle at `index`
    ///
    /// Later dongles shift down one index, like librtlsdr re-enumeration.
    /// Open handles to the removed dongle fail with `DeviceNotPresent`.
    pub fn detach(&self, index: u32) -> Option<VirtualDongleConfig> {
        let mut inner = lock(&self.inner);
        if (index as usize) < inner.slots.len() {
            info!("Detached virtual dongle at index {}", index);
            Some(inner.slots.remove(index as usize).config)
        } else {
            None
        }
    }

    /// Make `enumerate` fail with `err` until cleared with `None`
    pub fn fail_enumeration(&self, err: Option<TransportError>) {
        lock(&self.inner).enumeration_error = err;
    }

    /// Make the next `op` fail with `err` (one-shot)
    pub fn fail_next(&self, op: SimOp, err: TransportError) {
        lock(&self.inner).faults.push((op, err));
    }

    /// Delay every open and device operation by `latency`
    ///
    /// A latency longer than the caller's timeout simulates a wedged stick.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.inner).latency = latency;
    }

    /// Report claimed dongles with an unknown tuner from `enumerate`
    ///
    /// librtlsdr can only read the tuner by opening the device, which fails
    /// while another handle holds it.
    pub fn report_unknown_while_open(&self, enabled: bool) {
        lock(&self.inner).hide_tuner_while_open = enabled;
    }

    /// Mark a dongle as claimed by another process
    pub fn claim_externally(&self, index: u32) -> bool {
        let mut inner = lock(&self.inner);
        match inner.slots.get_mut(index as usize) {
            Some(slot) => {
                slot.state.open = true;
                true
            }
            None => false,
        }
    }

    /// Snapshot of the hardware-side state at `index`
    pub fn state(&self, index: u32) -> Option<DongleState> {
        lock(&self.inner)
            .slots
            .get(index as usize)
            .map(|s| s.state.clone())
    }

    /// Number of attached dongles
    pub fn dongle_count(&self) -> usize {
        lock(&self.inner).slots.len()
    }
}

impl RadioTransport for SimTransport {
    fn name(&self) -> &str {
        "simulated"
    }

    fn enumerate(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        let inner = lock(&self.inner);
        if let Some(err) = &inner.enumeration_error {
            return Err(err.clone());
        }
        Ok(inner
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let c = &slot.config;
                let tuner = if inner.hide_tuner_while_open && slot.state.open {
                    TunerType::Unknown
                } else {
                    c.tuner
                };
                let info =
                    DeviceInfo::new(i as u32, &c.manufacturer, &c.product, &c.serial, tuner);
                match c.usb_id {
                    Some(id) => info.with_usb_id(id),
                    None => info,
                }
            })
            .collect())
    }

    fn open(&self, index: u32) -> Result<Box<dyn RadioDevice>, TransportError> {
        SimInner::delay(&self.inner);

        let mut inner = lock(&self.inner);
        if let Some(err) = inner.take_fault(SimOp::Open) {
            debug!("Injected open failure on virtual dongle #{}", index);
            return Err(err);
        }
        let slot = inner
            .slots
            .get_mut(index as usize)
            .ok_or(TransportError::DeviceNotPresent(index))?;
        if slot.state.open {
            return Err(TransportError::DeviceBusy(index));
        }
        slot.state = DongleState {
            open: true,
            open_count: slot.state.open_count + 1,
            close_count: slot.state.close_count,
            ..DongleState::default()
        };
        let (id, tuner) = (slot.id, slot.config.tuner);
        debug!("Opened virtual dongle #{}", index);
        Ok(Box::new(VirtualDongle::new(
            Arc::clone(&self.inner),
            id,
            index,
            tuner,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_model::{Gain, GainMode};

    #[test]
    fn test_enumerate_reports_attached_dongles() {
        let sim = SimTransport::new();
        assert!(sim.enumerate().unwrap().is_empty());

        sim.attach(VirtualDongleConfig::default());
        sim.attach(VirtualDongleConfig {
            serial: "00000002".to_string(),
            tuner: TunerType::E4000,
            usb_id: None,
            ..Default::default()
        });

        let devices = sim.enumerate().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].index, 0);
        assert_eq!(devices[0].tuner, TunerType::R820T);
        assert!(devices[0].usb_id.is_some());
        assert_eq!(devices[1].index, 1);
        assert_eq!(devices[1].serial, "00000002");
        assert_eq!(devices[1].usb_id, None);
    }

    #[test]
    fn test_enumeration_failure_injection() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        sim.fail_enumeration(Some(TransportError::LibraryNotFound));
        assert_eq!(sim.enumerate(), Err(TransportError::LibraryNotFound));

        sim.fail_enumeration(None);
        assert_eq!(sim.enumerate().unwrap().len(), 1);
    }

    #[test]
    fn test_open_is_exclusive() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        let dongle = sim.open(0).unwrap();
        assert!(matches!(sim.open(0), Err(TransportError::DeviceBusy(0))));

        dongle.close().unwrap();
        let state = sim.state(0).unwrap();
        assert!(!state.open);
        assert_eq!(state.open_count, 1);
        assert_eq!(state.close_count, 1);

        assert!(sim.open(0).is_ok());
    }

    #[test]
    fn test_open_missing_index() {
        let sim = SimTransport::new();
        assert!(matches!(sim.open(3), Err(TransportError::DeviceNotPresent(3))));
    }

    #[test]
    fn test_external_claim_blocks_open() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        assert!(sim.claim_externally(0));
        assert!(matches!(sim.open(0), Err(TransportError::DeviceBusy(0))));
        assert!(!sim.claim_externally(5));
    }

    #[test]
    fn test_settings_are_recorded() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        let mut dongle = sim.open(0).unwrap();
        dongle.set_gain_mode(GainMode::Manual).unwrap();
        dongle.set_gain(Gain::from_tenths_db(197)).unwrap();
        dongle.set_center_frequency(1_090_000_000).unwrap();

        let state = sim.state(0).unwrap();
        assert_eq!(state.gain_mode, Some(GainMode::Manual));
        assert_eq!(state.gain, Some(Gain::from_tenths_db(197)));
        assert_eq!(state.center_frequency_hz, Some(1_090_000_000));
    }

    #[test]
    fn test_reopen_resets_settings() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        let mut dongle = sim.open(0).unwrap();
        dongle.set_center_frequency(100_000_000).unwrap();
        dongle.close().unwrap();

        let _dongle = sim.open(0).unwrap();
        let state = sim.state(0).unwrap();
        assert_eq!(state.center_frequency_hz, None);
        assert_eq!(state.open_count, 2);
    }

    #[test]
    fn test_one_shot_fault() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        let mut dongle = sim.open(0).unwrap();
        let err = TransportError::OperationFailed {
            op: "set_tuner_gain".to_string(),
            code: -1,
        };
        sim.fail_next(SimOp::SetGain, err.clone());

        assert_eq!(dongle.set_gain(Gain::from_tenths_db(0)), Err(err));
        assert!(dongle.set_gain(Gain::from_tenths_db(0)).is_ok());
    }

    #[test]
    fn test_unrepresentable_frequency() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        let mut dongle = sim.open(0).unwrap();
        assert!(matches!(
            dongle.set_center_frequency(u64::from(u32::MAX) + 1),
            Err(TransportError::Unrepresentable(_))
        ));
        assert_eq!(sim.state(0).unwrap().center_frequency_hz, None);
    }

    #[test]
    fn test_detach_invalidates_handle_and_shifts_indices() {
        let sim = SimTransport::with_dongles([
            VirtualDongleConfig::default(),
            VirtualDongleConfig {
                serial: "00000002".to_string(),
                ..Default::default()
            },
        ]);
        let mut dongle = sim.open(0).unwrap();

        let removed = sim.detach(0).unwrap();
        assert_eq!(removed.serial, "00000001");
        assert_eq!(sim.dongle_count(), 1);
        assert_eq!(sim.enumerate().unwrap()[0].serial, "00000002");

        assert!(matches!(
            dongle.set_center_frequency(1_090_000_000),
            Err(TransportError::DeviceNotPresent(0))
        ));
        assert!(sim.detach(7).is_none());
    }

    #[test]
    fn test_open_handle_reports_tuner() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig {
            tuner: TunerType::Fc0013,
            ..Default::default()
        }]);
        let dongle = sim.open(0).unwrap();
        assert_eq!(dongle.tuner(), TunerType::Fc0013);
    }

    #[test]
    fn test_claimed_dongle_can_hide_tuner() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        sim.report_unknown_while_open(true);
        assert_eq!(sim.enumerate().unwrap()[0].tuner, TunerType::R820T);

        let dongle = sim.open(0).unwrap();
        assert_eq!(sim.enumerate().unwrap()[0].tuner, TunerType::Unknown);
        assert_eq!(dongle.tuner(), TunerType::R820T);

        dongle.close().unwrap();
        assert_eq!(sim.enumerate().unwrap()[0].tuner, TunerType::R820T);
    }

    #[test]
    fn test_latency_delays_operations() {
        let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
        sim.set_latency(Duration::from_millis(30));

        let start = std::time::Instant::now();
        let _dongle = sim.open(0).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
