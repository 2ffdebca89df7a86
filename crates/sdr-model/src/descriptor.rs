//! Device records produced by enumeration

use crate::gain::Gain;
use crate::tuner::{TunerDatabase, TunerType};

/// Inclusive tunable frequency range in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequencyRange {
    /// Lowest tunable frequency in Hz
    pub min_hz: u64,
    /// Highest tunable frequency in Hz
    pub max_hz: u64,
}

impl FrequencyRange {
    pub const fn new(min_hz: u64, max_hz: u64) -> Self {
        Self { min_hz, max_hz }
    }

    /// Check whether a frequency lies within the range (bounds included)
    pub fn contains(&self, hz: u64) -> bool {
        (self.min_hz..=self.max_hz).contains(&hz)
    }
}

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl UsbId {
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self { vid, pid }
    }
}

/// Raw record reported by a transport for one attached device
///
/// This is what the driver knows before any capability lookup; the catalog
/// turns it into a [`DeviceDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Enumeration index
    pub index: u32,
    /// USB manufacturer string
    pub manufacturer: String,
    /// USB product string
    pub product: String,
    /// USB serial number string
    pub serial: String,
    /// USB VID/PID (if the transport knows it)
    pub usb_id: Option<UsbId>,
    /// Driver-supplied display name (librtlsdr's known-device name)
    pub name: Option<String>,
    /// Identified tuner chip
    pub tuner: TunerType,
}

impl DeviceInfo {
    pub fn new(
        index: u32,
        manufacturer: impl Into<String>,
        product: impl Into<String>,
        serial: impl Into<String>,
        tuner: TunerType,
    ) -> Self {
        Self {
            index,
            manufacturer: manufacturer.into(),
            product: product.into(),
            serial: serial.into(),
            usb_id: None,
            name: None,
            tuner,
        }
    }

    pub fn with_usb_id(mut self, usb_id: UsbId) -> Self {
        self.usb_id = Some(usb_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Immutable description of an enumerated radio and its capabilities
///
/// `supported_gains` is kept ascending and free of duplicates by every
/// constructor in this module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "DescriptorRecord"))]
pub struct DeviceDescriptor {
    /// Index within the enumeration that produced this descriptor
    pub index: u32,
    /// Display name
    pub name: String,
    /// USB serial number
    pub serial: String,
    /// USB manufacturer string
    pub manufacturer: String,
    /// USB product string
    pub product: String,
    /// USB VID/PID
    pub usb_id: Option<UsbId>,
    /// Tuner chip
    pub tuner: TunerType,
    /// Discrete gain steps, ascending and unique
    pub supported_gains: Vec<Gain>,
    /// Inclusive tunable range
    pub frequency_range: FrequencyRange,
}

impl DeviceDescriptor {
    /// Build a descriptor with an explicit capability table
    pub fn new(
        index: u32,
        name: impl Into<String>,
        serial: impl Into<String>,
        supported_gains: impl IntoIterator<Item = Gain>,
        frequency_range: FrequencyRange,
    ) -> Self {
        let mut gains: Vec<Gain> = supported_gains.into_iter().collect();
        gains.sort_unstable();
        gains.dedup();

        Self {
            index,
            name: name.into(),
            serial: serial.into(),
            manufacturer: String::new(),
            product: String::new(),
            usb_id: None,
            tuner: TunerType::Unknown,
            supported_gains: gains,
            frequency_range,
        }
    }

    /// Build a descriptor from a transport record, taking capabilities from
    /// the tuner database
    pub fn from_info(info: DeviceInfo, name: impl Into<String>) -> Self {
        let caps = TunerDatabase::capabilities(info.tuner);
        let mut descriptor = Self::new(
            info.index,
            name,
            info.serial,
            caps.gains,
            caps.frequency_range,
        );
        descriptor.manufacturer = info.manufacturer;
        descriptor.product = info.product;
        descriptor.usb_id = info.usb_id;
        descriptor.tuner = info.tuner;
        descriptor
    }

    /// Replace the tuner and its capability table
    ///
    /// Used when the tuner is only identified once the device is open.
    pub fn with_tuner(mut self, tuner: TunerType) -> Self {
        let caps = TunerDatabase::capabilities(tuner);
        self.tuner = tuner;
        self.supported_gains = caps.gains;
        self.frequency_range = caps.frequency_range;
        self
    }
}

/// Wire shape of [`DeviceDescriptor`]; deserializing goes through
/// [`DeviceDescriptor::new`] so the gain table is normalized
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct DescriptorRecord {
    index: u32,
    name: String,
    serial: String,
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    product: String,
    #[serde(default)]
    usb_id: Option<UsbId>,
    #[serde(default)]
    tuner: TunerType,
    supported_gains: Vec<Gain>,
    frequency_range: FrequencyRange,
}

#[cfg(feature = "serde")]
impl From<DescriptorRecord> for DeviceDescriptor {
    fn from(r: DescriptorRecord) -> Self {
        let mut descriptor = Self::new(
            r.index,
            r.name,
            r.serial,
            r.supported_gains,
            r.frequency_range,
        );
        descriptor.manufacturer = r.manufacturer;
        descriptor.product = r.product;
        descriptor.usb_id = r.usb_id;
        descriptor.tuner = r.tuner;
        descriptor
    }
}
