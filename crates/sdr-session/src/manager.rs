//! Session manager
//!
//! Owns at most one open radio and serializes every hardware operation on it.
//! Callers share a manager through `Arc`; concurrent calls queue on the
//! session lock in arrival order.
//!
//! Driver calls are blocking and can stall when a stick wedges, so each one
//! runs on tokio's blocking pool under a deadline from [`SessionConfig`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use sdr_detect::DeviceCatalog;
use sdr_model::{
    negotiate, CapabilityError, DeviceDescriptor, Gain, GainMode, RadioDevice, RadioTransport,
    TransportError, TunerType, ADSB_FREQUENCY_HZ,
};
use serde::{Deserialize, Serialize};
use tokio::task::{self, JoinHandle};
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::state::{FreqSettings, GainSettings, RadioSession};

/// Session manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for opening and initially configuring a device (ms)
    pub open_timeout_ms: u64,
    /// Deadline for gain/frequency changes (ms)
    pub control_timeout_ms: u64,
    /// Deadline for releasing a device (ms)
    pub close_timeout_ms: u64,
    /// Gain applied on a manual-gain open, snapped to the tuner's table
    pub initial_gain_db: Option<f64>,
    /// Center frequency tuned on open
    pub initial_frequency_hz: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_timeout_ms: 5000,
            control_timeout_ms: 1000,
            close_timeout_ms: 2000,
            initial_gain_db: Some(49.6),
            initial_frequency_hz: Some(ADSB_FREQUENCY_HZ),
        }
    }
}

/// Device handle shared with blocking workers; `None` once released
type SharedDevice = Arc<Mutex<Option<Box<dyn RadioDevice>>>>;

struct ActiveDevice {
    descriptor: DeviceDescriptor,
    device: SharedDevice,
}

/// A claimed device with the settings applied to it on open
struct Opened {
    device: Box<dyn RadioDevice>,
    descriptor: DeviceDescriptor,
    gain: Option<Gain>,
    frequency_hz: Option<u64>,
}

#[derive(Default)]
struct SessionState {
    session: RadioSession,
    active: Option<ActiveDevice>,
}

/// Manages exclusive access to one radio at a time
pub struct SessionManager {
    catalog: Arc<DeviceCatalog>,
    config: SessionConfig,
    listing: RwLock<Vec<DeviceDescriptor>>,
    state: tokio::sync::Mutex<SessionState>,
}

impl SessionManager {
    /// Create a manager with default configuration
    pub fn new(catalog: DeviceCatalog) -> Self {
        Self::with_config(catalog, SessionConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(catalog: DeviceCatalog, config: SessionConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            config,
            listing: RwLock::new(Vec::new()),
            state: tokio::sync::Mutex::new(SessionState::default()),
        }
    }

    /// Create a manager directly over a transport
    pub fn for_transport(transport: Arc<dyn RadioTransport>, config: SessionConfig) -> Self {
        Self::with_config(DeviceCatalog::new(transport), config)
    }

    /// Get the current configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Enumerate attached radios
    ///
    /// Does not wait for the session lock. The result replaces the listing
    /// that `open` validates indices against; a failed enumeration clears it,
    /// so no index can be opened until the next successful listing.
    ///
    /// A stick held open cannot report its tuner. When a device comes back
    /// with an unknown tuner, the tuner from the previous listing is kept as
    /// long as index and serial still match.
    pub async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, SessionError> {
        let catalog = Arc::clone(&self.catalog);
        let result = match task::spawn_blocking(move || catalog.list_devices()).await {
            Ok(result) => result.map_err(SessionError::from),
            Err(e) => Err(SessionError::TaskFailed(e.to_string())),
        };

        let mut listing = self.listing.write().unwrap_or_else(PoisonError::into_inner);
        let devices = match result {
            Ok(devices) => carry_forward_tuners(devices, &listing),
            Err(e) => {
                warn!("Device listing failed, forgetting previous listing: {}", e);
                listing.clear();
                return Err(e);
            }
        };
        *listing = devices.clone();
        Ok(devices)
    }

    /// Open the device at `index` from the most recent listing
    ///
    /// With `auto_gain_control` the tuner is put in AGC mode and no gain is
    /// recorded; otherwise the configured initial gain is applied. The
    /// configured initial frequency is tuned in either case. If any step
    /// fails the device is released and the session stays closed.
    pub async fn open(
        &self,
        index: u32,
        auto_gain_control: bool,
    ) -> Result<RadioSession, SessionError> {
        let mut state = self.state.lock().await;

        if let Some(open) = state.session.device_index {
            warn!("Refusing to open device #{}: #{} is already open", index, open);
            return Err(SessionError::DeviceBusy {
                requested: index,
                open,
            });
        }

        let descriptor = self
            .listed(index)
            .ok_or(SessionError::DeviceNotFound(index))?;

        let mode = if auto_gain_control {
            GainMode::Auto
        } else {
            GainMode::Manual
        };
        let initial_gain_db = if auto_gain_control {
            None
        } else {
            self.config.initial_gain_db
        };
        if let Some(db) = initial_gain_db.filter(|db| !db.is_finite()) {
            return Err(CapabilityError::InvalidGain(db).into());
        }
        let initial_frequency_hz = self.config.initial_frequency_hz;

        info!(
            "Opening device #{} ({}, SN: {}) with {:?} gain",
            index, descriptor.name, descriptor.serial, mode
        );

        let transport = Arc::clone(self.catalog.transport());
        let worker = task::spawn_blocking(move || {
            open_and_configure(
                transport.as_ref(),
                descriptor,
                mode,
                initial_gain_db,
                initial_frequency_hz,
            )
        });

        let timeout_ms = self.config.open_timeout_ms;
        let opened = match await_worker(worker, "open", timeout_ms, reap_late_open).await {
            Ok(opened) => opened,
            Err(SessionError::Transport(TransportError::DeviceNotPresent(i))) => {
                return Err(SessionError::DeviceNotFound(i))
            }
            Err(e) => return Err(e),
        };
        self.relist(&opened.descriptor);

        state.session = RadioSession {
            device_index: Some(index),
            is_open: true,
            auto_gain_control,
            current_gain: opened.gain,
            current_frequency_hz: opened.frequency_hz,
        };
        state.active = Some(ActiveDevice {
            descriptor: opened.descriptor,
            device: Arc::new(Mutex::new(Some(opened.device))),
        });

        info!("Device #{} open", index);
        Ok(state.session.clone())
    }

    /// Set the tuner gain, snapped to the nearest supported step
    ///
    /// Switches the tuner to manual gain if AGC was enabled. Returns the gain
    /// actually applied.
    pub async fn set_gain(&self, requested_db: f64) -> Result<Gain, SessionError> {
        let mut state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(SessionError::NoActiveSession)?;

        let gain = negotiate::resolve_gain(&active.descriptor, requested_db)?;
        let leave_agc = state.session.auto_gain_control;
        let device = Arc::clone(&active.device);

        debug!("Setting gain {} (requested {} dB)", gain, requested_db);
        self.control("set_gain", device, move |dev| {
            if leave_agc {
                dev.set_gain_mode(GainMode::Manual)?;
            }
            dev.set_gain(gain)
        })
        .await?;

        state.session.auto_gain_control = false;
        state.session.current_gain = Some(gain);
        Ok(gain)
    }

    /// Tune the center frequency; refused outside the tuner's range
    pub async fn set_frequency(&self, requested_hz: u64) -> Result<u64, SessionError> {
        let mut state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(SessionError::NoActiveSession)?;

        let hz = negotiate::resolve_frequency(&active.descriptor, requested_hz)?;
        let device = Arc::clone(&active.device);

        debug!("Tuning to {} Hz", hz);
        self.control("set_frequency", device, move |dev| {
            dev.set_center_frequency(hz)
        })
        .await?;

        state.session.current_frequency_hz = Some(hz);
        Ok(hz)
    }

    /// Supported gains and the current setting of the open device
    pub async fn gain_settings(&self) -> Result<GainSettings, SessionError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(GainSettings {
            supported: active.descriptor.supported_gains.clone(),
            current: state.session.current_gain,
            auto_gain_control: state.session.auto_gain_control,
        })
    }

    /// Tunable range and the current setting of the open device
    pub async fn freq_settings(&self) -> Result<FreqSettings, SessionError> {
        let state = self.state.lock().await;
        let active = state.active.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(FreqSettings {
            range: active.descriptor.frequency_range,
            current: state.session.current_frequency_hz,
        })
    }

    /// Supported gains of a listed device, without opening it
    ///
    /// `current` is always unset; use [`gain_settings`](Self::gain_settings)
    /// for the open device.
    pub fn gain_settings_for(&self, index: u32) -> Result<GainSettings, SessionError> {
        let descriptor = self
            .listed(index)
            .ok_or(SessionError::DeviceNotFound(index))?;
        Ok(GainSettings {
            supported: descriptor.supported_gains,
            current: None,
            auto_gain_control: false,
        })
    }

    /// Tunable range of a listed device, without opening it
    pub fn freq_settings_for(&self, index: u32) -> Result<FreqSettings, SessionError> {
        let descriptor = self
            .listed(index)
            .ok_or(SessionError::DeviceNotFound(index))?;
        Ok(FreqSettings {
            range: descriptor.frequency_range,
            current: None,
        })
    }

    /// Snapshot of the session
    pub async fn session(&self) -> RadioSession {
        self.state.lock().await.session.clone()
    }

    /// Release the open device
    ///
    /// Closing with no open session is a no-op. The session is reset to
    /// closed even if the driver fails or stalls; a stalled release finishes
    /// in the background.
    pub async fn close(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.take() else {
            debug!("Close with no open session");
            return Ok(());
        };
        let index = active.descriptor.index;
        state.session = RadioSession::closed();

        info!("Closing device #{}", index);
        let worker = task::spawn_blocking(move || release(&active.device));
        let result =
            await_worker(worker, "close", self.config.close_timeout_ms, |_| {}).await;
        if let Err(e) = &result {
            warn!("Device #{} did not close cleanly: {}", index, e);
        }
        result
    }

    fn listed(&self, index: u32) -> Option<DeviceDescriptor> {
        self.listing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| d.index == index)
            .cloned()
    }

    /// Replace the listed entry for a device whose capabilities were
    /// refreshed on open, unless the listing moved on meanwhile
    fn relist(&self, descriptor: &DeviceDescriptor) {
        let mut listing = self.listing.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = listing
            .iter_mut()
            .find(|d| d.index == descriptor.index && d.serial == descriptor.serial)
        {
            *entry = descriptor.clone();
        }
    }

    async fn control<F>(
        &self,
        op: &'static str,
        device: SharedDevice,
        f: F,
    ) -> Result<(), SessionError>
    where
        F: FnOnce(&mut dyn RadioDevice) -> Result<(), TransportError> + Send + 'static,
    {
        let worker = task::spawn_blocking(move || {
            let mut guard = lock_device(&device);
            match guard.as_mut() {
                Some(dev) => f(dev.as_mut()),
                None => Err(TransportError::Unavailable("device released".to_string())),
            }
        });
        let timeout_ms = self.config.control_timeout_ms;
        await_worker(worker, op, timeout_ms, move |worker| {
            report_late_control(op, worker)
        })
        .await
    }
}

impl Drop for SessionManager {
    /// Releases a device left open
    ///
    /// Inside a tokio runtime the release is handed to the blocking pool so a
    /// stalled driver cannot hold up the executor; outside one it runs inline.
    fn drop(&mut self) {
        let Some(active) = self.state.get_mut().active.take() else {
            return;
        };
        let index = active.descriptor.index;
        warn!("Session manager dropped with device #{} open; releasing it", index);

        let device = active.device;
        let release_on_drop = move || {
            if let Err(e) = release(&device) {
                warn!("Failed to release device #{} on drop: {}", index, e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(release_on_drop);
            }
            Err(_) => release_on_drop(),
        }
    }
}

/// Keep the listed tuner of devices that now enumerate as unknown
fn carry_forward_tuners(
    devices: Vec<DeviceDescriptor>,
    previous: &[DeviceDescriptor],
) -> Vec<DeviceDescriptor> {
    devices
        .into_iter()
        .map(|device| {
            if device.tuner != TunerType::Unknown {
                return device;
            }
            let known = previous.iter().find(|p| {
                p.index == device.index
                    && p.serial == device.serial
                    && p.tuner != TunerType::Unknown
            });
            match known {
                Some(p) => {
                    debug!(
                        "Device #{} reported no tuner; keeping {:?} from the last listing",
                        device.index, p.tuner
                    );
                    device.with_tuner(p.tuner)
                }
                None => device,
            }
        })
        .collect()
}

/// Open a device and apply its initial settings, releasing it on failure
///
/// The capability table is refreshed from the tuner the open handle reports
/// before initial settings are resolved against it.
fn open_and_configure(
    transport: &dyn RadioTransport,
    listed: DeviceDescriptor,
    mode: GainMode,
    gain_db: Option<f64>,
    frequency_hz: Option<u64>,
) -> Result<Opened, TransportError> {
    let index = listed.index;
    let mut device = transport.open(index)?;

    let tuner = device.tuner();
    let descriptor = if tuner != TunerType::Unknown && tuner != listed.tuner {
        info!(
            "Device #{} identifies as {:?}, listed as {:?}; refreshing capabilities",
            index, tuner, listed.tuner
        );
        listed.with_tuner(tuner)
    } else {
        listed
    };

    let gain = gain_db.and_then(|db| initial_gain(&descriptor, db));
    let frequency_hz = frequency_hz.and_then(|hz| initial_frequency(&descriptor, hz));

    let configured = configure(device.as_mut(), mode, gain, frequency_hz);
    if let Err(e) = configured {
        warn!("Initial configuration of device #{} failed: {}", index, e);
        if let Err(close_err) = device.close() {
            warn!("Failed to release device #{}: {}", index, close_err);
        }
        return Err(e);
    }
    Ok(Opened {
        device,
        descriptor,
        gain,
        frequency_hz,
    })
}

fn initial_gain(descriptor: &DeviceDescriptor, requested_db: f64) -> Option<Gain> {
    match negotiate::resolve_gain(descriptor, requested_db) {
        Ok(gain) => Some(gain),
        Err(e) => {
            warn!(
                "Leaving tuner gain untouched on device #{}: {}",
                descriptor.index, e
            );
            None
        }
    }
}

fn initial_frequency(descriptor: &DeviceDescriptor, requested_hz: u64) -> Option<u64> {
    match negotiate::resolve_frequency(descriptor, requested_hz) {
        Ok(hz) => Some(hz),
        Err(e) => {
            warn!("Not tuning device #{} on open: {}", descriptor.index, e);
            None
        }
    }
}

fn configure(
    device: &mut dyn RadioDevice,
    mode: GainMode,
    gain: Option<Gain>,
    frequency_hz: Option<u64>,
) -> Result<(), TransportError> {
    device.set_gain_mode(mode)?;
    if let Some(gain) = gain {
        device.set_gain(gain)?;
    }
    if let Some(hz) = frequency_hz {
        device.set_center_frequency(hz)?;
    }
    Ok(())
}

/// Close a handle that finished opening after its caller gave up
fn reap_late_open(worker: JoinHandle<Result<Opened, TransportError>>) {
    tokio::spawn(async move {
        if let Ok(Ok(Opened { device, .. })) = worker.await {
            let index = device.index();
            warn!("Releasing device #{} that opened after timeout", index);
            let closed = task::spawn_blocking(move || device.close()).await;
            if let Ok(Err(e)) = closed {
                warn!("Failed to release late device #{}: {}", index, e);
            }
        }
    });
}

/// Log the outcome of a control call that finished after its caller gave up
///
/// A late success means the hardware now holds a setting the session does
/// not record.
fn report_late_control(op: &'static str, worker: JoinHandle<Result<(), TransportError>>) {
    tokio::spawn(async move {
        match worker.await {
            Ok(Ok(())) => warn!(
                "{} completed after timing out; hardware may differ from the session",
                op
            ),
            Ok(Err(e)) => debug!("{} failed after timing out: {}", op, e),
            Err(e) => debug!("{} worker did not finish: {}", op, e),
        }
    });
}

fn release(device: &SharedDevice) -> Result<(), TransportError> {
    match lock_device(device).take() {
        Some(dev) => dev.close(),
        None => Ok(()),
    }
}

fn lock_device(device: &SharedDevice) -> MutexGuard<'_, Option<Box<dyn RadioDevice>>> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wait for a blocking worker under a deadline
///
/// On timeout the worker keeps running; `on_timeout` receives its handle.
async fn await_worker<T, R>(
    mut worker: JoinHandle<Result<T, TransportError>>,
    op: &'static str,
    timeout_ms: u64,
    on_timeout: R,
) -> Result<T, SessionError>
where
    T: Send + 'static,
    R: FnOnce(JoinHandle<Result<T, TransportError>>) + Send,
{
    match time::timeout(Duration::from_millis(timeout_ms), &mut worker).await {
        Ok(Ok(result)) => result.map_err(SessionError::from),
        Ok(Err(join)) => Err(SessionError::TaskFailed(join.to_string())),
        Err(_) => {
            warn!("{} timed out after {}ms", op, timeout_ms);
            on_timeout(worker);
            Err(SessionError::HardwareTimeout { op, timeout_ms })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_model::FrequencyRange;

    fn descriptor(gains: &[i32]) -> DeviceDescriptor {
        DeviceDescriptor::new(
            0,
            "Test",
            "1",
            gains.iter().copied().map(Gain::from_tenths_db),
            FrequencyRange::new(24_000_000, 1_766_000_000),
        )
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.open_timeout_ms, 5000);
        assert_eq!(config.control_timeout_ms, 1000);
        assert_eq!(config.close_timeout_ms, 2000);
        assert_eq!(config.initial_frequency_hz, Some(ADSB_FREQUENCY_HZ));
    }

    #[test]
    fn test_config_missing_fields_default() {
        let config: SessionConfig = serde_json::from_str(r#"{"open_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.open_timeout_ms, 250);
        assert_eq!(config.close_timeout_ms, 2000);
    }

    #[test]
    fn test_initial_gain_snaps_to_table() {
        let gain = initial_gain(&descriptor(&[0, 197, 496]), 20.0);
        assert_eq!(gain, Some(Gain::from_tenths_db(197)));
    }

    #[test]
    fn test_initial_gain_skipped_without_table() {
        assert_eq!(initial_gain(&descriptor(&[]), 49.6), None);
    }

    #[test]
    fn test_initial_frequency_outside_range_is_skipped() {
        let mut fc2580 = descriptor(&[0]);
        fc2580.tuner = TunerType::Fc2580;
        fc2580.frequency_range = FrequencyRange::new(146_000_000, 924_000_000);
        assert_eq!(initial_frequency(&fc2580, ADSB_FREQUENCY_HZ), None);
        assert_eq!(
            initial_frequency(&descriptor(&[0]), ADSB_FREQUENCY_HZ),
            Some(ADSB_FREQUENCY_HZ)
        );
    }

    #[test]
    fn test_carry_forward_keeps_known_tuner() {
        let previous = vec![descriptor(&[0]).with_tuner(TunerType::R820T)];
        let current = vec![descriptor(&[]).with_tuner(TunerType::Unknown)];

        let merged = carry_forward_tuners(current, &previous);
        assert_eq!(merged[0].tuner, TunerType::R820T);
        assert_eq!(merged[0].supported_gains.len(), 29);
    }

    #[test]
    fn test_carry_forward_requires_same_serial() {
        let previous = vec![descriptor(&[0]).with_tuner(TunerType::R820T)];
        let mut other = descriptor(&[]).with_tuner(TunerType::Unknown);
        other.serial = "2".to_string();

        let merged = carry_forward_tuners(vec![other], &previous);
        assert_eq!(merged[0].tuner, TunerType::Unknown);
        assert!(merged[0].supported_gains.is_empty());
    }

    #[test]
    fn test_carry_forward_prefers_fresh_tuner() {
        let previous = vec![descriptor(&[0]).with_tuner(TunerType::R820T)];
        let current = vec![descriptor(&[]).with_tuner(TunerType::E4000)];

        let merged = carry_forward_tuners(current, &previous);
        assert_eq!(merged[0].tuner, TunerType::E4000);
    }
}
