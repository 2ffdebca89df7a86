//! RTL-SDR Model Library
//!
//! This crate describes RTL2832U-based receivers independent of any
//! particular driver:
//!
//! - **Tuner database**: gain tables and tunable ranges for each tuner chip
//!   (E4000, FC0012, FC0013, FC2580, R820T/R828D)
//! - **Descriptors**: immutable records produced by device enumeration
//! - **Negotiation**: pure resolution of requested gain/frequency against a
//!   device's capability table
//! - **Transport seam**: the `RadioTransport` / `RadioDevice` traits that real
//!   hardware backends and simulations implement
//!
//! # Example
//!
//! ```rust
//! use sdr_model::{negotiate, DeviceDescriptor, DeviceInfo, TunerType};
//!
//! let info = DeviceInfo::new(0, "Realtek", "RTL2838UHIDIR", "00000001", TunerType::R820T);
//! let device = DeviceDescriptor::from_info(info, "Generic RTL2832U OEM");
//!
//! // 20 dB is not in the R820T table; the nearest step is 19.7 dB
//! let gain = negotiate::resolve_gain(&device, 20.0).unwrap();
//! assert_eq!(gain.db(), 19.7);
//!
//! // 1090 MHz is inside the tunable range and is returned unchanged
//! assert_eq!(negotiate::resolve_frequency(&device, 1_090_000_000).unwrap(), 1_090_000_000);
//! ```

pub mod descriptor;
pub mod error;
pub mod gain;
pub mod negotiate;
pub mod transport;
pub mod tuner;

pub use descriptor::{DeviceDescriptor, DeviceInfo, FrequencyRange, UsbId};
pub use error::{CapabilityError, TransportError};
pub use gain::Gain;
pub use negotiate::{resolve_frequency, resolve_gain};
pub use transport::{GainMode, RadioDevice, RadioTransport};
pub use tuner::{TunerCapabilities, TunerDatabase, TunerType};

/// 1090 MHz, the Mode S / ADS-B downlink frequency
pub const ADSB_FREQUENCY_HZ: u64 = 1_090_000_000;
