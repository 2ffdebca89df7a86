//! librtlsdr transport backend
//!
//! Binds the system librtlsdr at runtime with `libloading`, so the same
//! binary runs with or without the library installed. Only the calls needed
//! for enumeration and session control are bound; sample streaming lives
//! elsewhere.
//!
//! librtlsdr only reports the tuner chip on an open handle, so enumeration
//! has to claim each stick briefly. Tuners already identified are cached by
//! USB strings and not re-read, which keeps enumeration from touching a
//! device this process holds open.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, Mutex, PoisonError};

use libloading::Library;
use sdr_model::{DeviceInfo, Gain, GainMode, RadioDevice, RadioTransport, TransportError, TunerType};
use tracing::{debug, info, trace, warn};

/// Opaque `rtlsdr_dev_t *`
type DevPtr = *mut c_void;

/// libusb's LIBUSB_ERROR_BUSY, passed through by `rtlsdr_open`
const LIBUSB_ERROR_BUSY: c_int = -6;

/// Size of the buffers `rtlsdr_get_device_usb_strings` fills
const USB_STRING_LEN: usize = 256;

#[cfg(target_os = "linux")]
const LIB_NAMES: &[&str] = &["librtlsdr.so.0", "librtlsdr.so"];

#[cfg(target_os = "macos")]
const LIB_NAMES: &[&str] = &["librtlsdr.dylib", "librtlsdr.0.dylib"];

#[cfg(target_os = "windows")]
const LIB_NAMES: &[&str] = &["rtlsdr.dll", "librtlsdr.dll"];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LIB_NAMES: &[&str] = &["librtlsdr.so"];

/// Function pointers resolved from the loaded library
struct Api {
    get_device_count: unsafe extern "C" fn() -> c_uint,
    get_device_name: unsafe extern "C" fn(c_uint) -> *const c_char,
    get_device_usb_strings:
        unsafe extern "C" fn(c_uint, *mut c_char, *mut c_char, *mut c_char) -> c_int,
    open: unsafe extern "C" fn(*mut DevPtr, c_uint) -> c_int,
    close: unsafe extern "C" fn(DevPtr) -> c_int,
    get_tuner_type: unsafe extern "C" fn(DevPtr) -> c_int,
    set_tuner_gain_mode: unsafe extern "C" fn(DevPtr, c_int) -> c_int,
    set_tuner_gain: unsafe extern "C" fn(DevPtr, c_int) -> c_int,
    set_center_freq: unsafe extern "C" fn(DevPtr, u32) -> c_int,
}

/// The library stays loaded for as long as any transport or device holds it
struct Loaded {
    api: Api,
    _lib: Library,
}

/// Copy a function pointer out of the library
///
/// # Safety
/// `T` must match the C signature of `name`, and the returned pointer must
/// not outlive `lib`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, TransportError> {
    lib.get::<T>(name).map(|s| *s).map_err(|e| {
        TransportError::Unavailable(format!(
            "missing symbol {}: {}",
            String::from_utf8_lossy(name).trim_end_matches('\0'),
            e
        ))
    })
}

fn load_api(lib: &Library) -> Result<Api, TransportError> {
    // SAFETY: signatures follow rtl-sdr.h; pointers are kept alongside the
    // Library in `Loaded`.
    unsafe {
        Ok(Api {
            get_device_count: symbol(lib, b"rtlsdr_get_device_count\0")?,
            get_device_name: symbol(lib, b"rtlsdr_get_device_name\0")?,
            get_device_usb_strings: symbol(lib, b"rtlsdr_get_device_usb_strings\0")?,
            open: symbol(lib, b"rtlsdr_open\0")?,
            close: symbol(lib, b"rtlsdr_close\0")?,
            get_tuner_type: symbol(lib, b"rtlsdr_get_tuner_type\0")?,
            set_tuner_gain_mode: symbol(lib, b"rtlsdr_set_tuner_gain_mode\0")?,
            set_tuner_gain: symbol(lib, b"rtlsdr_set_tuner_gain\0")?,
            set_center_freq: symbol(lib, b"rtlsdr_set_center_freq\0")?,
        })
    }
}

/// Manufacturer, product and serial strings of a stick
type UsbStrings = (String, String, String);

/// Tuners identified so far, keyed by USB strings
#[derive(Default)]
struct TunerCache {
    known: Mutex<HashMap<UsbStrings, TunerType>>,
}

impl TunerCache {
    fn get(&self, key: &UsbStrings) -> Option<TunerType> {
        let known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        known.get(key).copied()
    }

    fn remember(&self, key: UsbStrings, tuner: TunerType) {
        // A blank serial cannot tell identical sticks apart
        if key.2.is_empty() || tuner == TunerType::Unknown {
            return;
        }
        let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        known.insert(key, tuner);
    }
}

/// Transport backed by the system librtlsdr
pub struct LibRtlSdr {
    loaded: Arc<Loaded>,
    tuners: TunerCache,
}

impl LibRtlSdr {
    /// Load librtlsdr from the platform's usual library names
    pub fn load() -> Result<Self, TransportError> {
        for name in LIB_NAMES {
            // SAFETY: loading librtlsdr runs no initialisers with preconditions
            let lib = match unsafe { Library::new(name) } {
                Ok(lib) => lib,
                Err(e) => {
                    trace!("Could not load {}: {}", name, e);
                    continue;
                }
            };
            match load_api(&lib) {
                Ok(api) => {
                    info!("Loaded RTL-SDR library: {}", name);
                    return Ok(Self {
                        loaded: Arc::new(Loaded { api, _lib: lib }),
                        tuners: TunerCache::default(),
                    });
                }
                Err(e) => warn!("{} is not a usable librtlsdr: {}", name, e),
            }
        }
        debug!("RTL-SDR library not found");
        Err(TransportError::LibraryNotFound)
    }

    fn usb_strings(&self, index: u32) -> Option<UsbStrings> {
        let mut manufacturer = [0u8; USB_STRING_LEN];
        let mut product = [0u8; USB_STRING_LEN];
        let mut serial = [0u8; USB_STRING_LEN];

        // SAFETY: each buffer holds the 256 bytes librtlsdr writes at most
        let ret = unsafe {
            (self.loaded.api.get_device_usb_strings)(
                index,
                manufacturer.as_mut_ptr() as *mut c_char,
                product.as_mut_ptr() as *mut c_char,
                serial.as_mut_ptr() as *mut c_char,
            )
        };

        (ret == 0).then(|| {
            (
                c_buf_to_string(&manufacturer),
                c_buf_to_string(&product),
                c_buf_to_string(&serial),
            )
        })
    }

    fn device_name(&self, index: u32) -> Option<String> {
        // SAFETY: returns a static string or NULL
        let name = unsafe { (self.loaded.api.get_device_name)(index) };
        if name.is_null() {
            None
        } else {
            // SAFETY: non-null pointers reference NUL-terminated static strings
            Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
        }
    }

    /// Tuner for an enumerated stick, from the cache or a brief open
    ///
    /// Fails soft: a stick claimed elsewhere reports `TunerType::Unknown`.
    fn identify_tuner(&self, index: u32, strings: &UsbStrings) -> TunerType {
        if let Some(tuner) = self.tuners.get(strings) {
            return tuner;
        }
        match RawHandle::open(&self.loaded, index) {
            Ok(handle) => {
                let tuner = handle.tuner();
                self.tuners.remember(strings.clone(), tuner);
                tuner
            }
            Err(e) => {
                debug!("Could not read tuner on device {}: {}", index, e);
                TunerType::Unknown
            }
        }
    }
}

impl RadioTransport for LibRtlSdr {
    fn name(&self) -> &str {
        "librtlsdr"
    }

    fn enumerate(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        // SAFETY: no arguments, no preconditions
        let count = unsafe { (self.loaded.api.get_device_count)() };
        let mut devices = Vec::with_capacity(count as usize);

        for index in 0..count {
            let strings = self.usb_strings(index).unwrap_or_default();
            let tuner = self.identify_tuner(index, &strings);
            let (manufacturer, product, serial) = strings;
            let mut info = DeviceInfo::new(index, manufacturer, product, serial, tuner);
            info.name = self.device_name(index);
            trace!("librtlsdr device #{}: {:?}", index, info);
            devices.push(info);
        }

        Ok(devices)
    }

    fn open(&self, index: u32) -> Result<Box<dyn RadioDevice>, TransportError> {
        let handle = RawHandle::open(&self.loaded, index)?;
        let tuner = handle.tuner();
        if let Some(strings) = self.usb_strings(index) {
            self.tuners.remember(strings, tuner);
        }
        info!("Opened RTL-SDR device #{} ({:?})", index, tuner);
        Ok(Box::new(LibRtlSdrDevice {
            handle,
            index,
            tuner,
        }))
    }
}

/// Owns an `rtlsdr_dev_t *` and closes it on drop
struct RawHandle {
    loaded: Arc<Loaded>,
    dev: DevPtr,
}

// SAFETY: librtlsdr handles may be used from any thread as long as calls are
// not concurrent; RawHandle is only reachable through `&mut` or by value.
unsafe impl Send for RawHandle {}

impl RawHandle {
    fn open(loaded: &Arc<Loaded>, index: u32) -> Result<Self, TransportError> {
        let mut dev: DevPtr = ptr::null_mut();
        // SAFETY: dev is a valid out-pointer
        let ret = unsafe { (loaded.api.open)(&mut dev, index) };
        match ret {
            0 if !dev.is_null() => Ok(Self {
                loaded: Arc::clone(loaded),
                dev,
            }),
            0 => Err(TransportError::OperationFailed {
                op: "rtlsdr_open".to_string(),
                code: 0,
            }),
            LIBUSB_ERROR_BUSY => Err(TransportError::DeviceBusy(index)),
            code => Err(TransportError::OperationFailed {
                op: "rtlsdr_open".to_string(),
                code,
            }),
        }
    }

    fn tuner(&self) -> TunerType {
        // SAFETY: dev is live until close
        let code = unsafe { (self.loaded.api.get_tuner_type)(self.dev) };
        TunerType::from_librtlsdr(code)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.dev.is_null() {
            return Ok(());
        }
        // SAFETY: dev is live and is nulled so it is never closed twice
        let ret = unsafe { (self.loaded.api.close)(self.dev) };
        self.dev = ptr::null_mut();
        check("rtlsdr_close", ret)
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to release RTL-SDR handle: {}", e);
        }
    }
}

/// A claimed librtlsdr device
struct LibRtlSdrDevice {
    handle: RawHandle,
    index: u32,
    tuner: TunerType,
}

impl RadioDevice for LibRtlSdrDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn tuner(&self) -> TunerType {
        self.tuner
    }

    fn set_gain_mode(&mut self, mode: GainMode) -> Result<(), TransportError> {
        let manual = match mode {
            GainMode::Auto => 0,
            GainMode::Manual => 1,
        };
        // SAFETY: handle is live for the lifetime of self
        let ret = unsafe { (self.handle.loaded.api.set_tuner_gain_mode)(self.handle.dev, manual) };
        check("rtlsdr_set_tuner_gain_mode", ret)
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), TransportError> {
        // SAFETY: handle is live for the lifetime of self
        let ret =
            unsafe { (self.handle.loaded.api.set_tuner_gain)(self.handle.dev, gain.tenths_db()) };
        check("rtlsdr_set_tuner_gain", ret)
    }

    fn set_center_frequency(&mut self, hz: u64) -> Result<(), TransportError> {
        let hz = u32::try_from(hz)
            .map_err(|_| TransportError::Unrepresentable(format!("{} Hz exceeds u32", hz)))?;
        // SAFETY: handle is live for the lifetime of self
        let ret = unsafe { (self.handle.loaded.api.set_center_freq)(self.handle.dev, hz) };
        check("rtlsdr_set_center_freq", ret)
    }

    fn close(mut self: Box<Self>) -> Result<(), TransportError> {
        info!("Closing RTL-SDR device #{}", self.index);
        self.handle.close()
    }
}

fn check(op: &str, ret: c_int) -> Result<(), TransportError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(TransportError::OperationFailed {
            op: op.to_string(),
            code: ret,
        })
    }
}

fn c_buf_to_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_buf_to_string() {
        let mut buf = [0u8; 16];
        buf[..7].copy_from_slice(b"Realtek");
        assert_eq!(c_buf_to_string(&buf), "Realtek");
        assert_eq!(c_buf_to_string(b"no-terminator"), "no-terminator");
        assert_eq!(c_buf_to_string(&[0u8; 4]), "");
    }

    fn strings(serial: &str) -> UsbStrings {
        ("Realtek".to_string(), "RTL2838UHIDIR".to_string(), serial.to_string())
    }

    #[test]
    fn test_tuner_cache_remembers_identified_sticks() {
        let cache = TunerCache::default();
        assert_eq!(cache.get(&strings("00000001")), None);

        cache.remember(strings("00000001"), TunerType::R820T);
        assert_eq!(cache.get(&strings("00000001")), Some(TunerType::R820T));
        assert_eq!(cache.get(&strings("00000002")), None);
    }

    #[test]
    fn test_tuner_cache_skips_unusable_entries() {
        let cache = TunerCache::default();
        cache.remember(strings(""), TunerType::R820T);
        assert_eq!(cache.get(&strings("")), None);

        cache.remember(strings("00000001"), TunerType::Unknown);
        assert_eq!(cache.get(&strings("00000001")), None);
    }

    #[test]
    fn test_check_return_codes() {
        assert!(check("rtlsdr_close", 0).is_ok());
        assert_eq!(
            check("rtlsdr_set_tuner_gain", -1),
            Err(TransportError::OperationFailed {
                op: "rtlsdr_set_tuner_gain".to_string(),
                code: -1
            })
        );
    }
}
