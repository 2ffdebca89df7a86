//! Device catalog
//!
//! Enumerates attached receivers through the transport and attaches each
//! one's capability table. Every call performs a fresh enumeration; dongles
//! are hot-plugged often enough that a cached list would go stale.

use std::sync::Arc;

use sdr_model::{DeviceDescriptor, DeviceInfo, RadioTransport};
use tracing::{debug, info};

use crate::error::DetectError;
use crate::usb_ids;

/// Catalog configuration
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    /// Hide devices with these serial numbers (e.g. a stick reserved for
    /// another application)
    pub skip_serials: Vec<String>,
}

/// Enumerates radios via a transport backend
pub struct DeviceCatalog {
    transport: Arc<dyn RadioTransport>,
    config: CatalogConfig,
}

impl DeviceCatalog {
    /// Create a catalog with default configuration
    pub fn new(transport: Arc<dyn RadioTransport>) -> Self {
        Self::with_config(transport, CatalogConfig::default())
    }

    /// Create a catalog with custom configuration
    pub fn with_config(transport: Arc<dyn RadioTransport>, config: CatalogConfig) -> Self {
        Self { transport, config }
    }

    /// The transport this catalog enumerates through
    pub fn transport(&self) -> &Arc<dyn RadioTransport> {
        &self.transport
    }

    /// Enumerate all currently attached radios
    ///
    /// Returns an empty list when nothing is attached.
    pub fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, DetectError> {
        debug!("Enumerating devices via {}...", self.transport.name());
        let infos = self
            .transport
            .enumerate()
            .map_err(|source| DetectError::EnumerationFailed {
                transport: self.transport.name().to_string(),
                source,
            })?;

        let result: Vec<_> = infos
            .into_iter()
            .map(describe)
            .filter(|d| !self.should_skip(d))
            .collect();

        if result.is_empty() {
            info!("No RTL-SDR devices found");
        } else {
            info!("Found {} RTL-SDR device(s)", result.len());
            for device in &result {
                info!(
                    "  #{} - {} (SN: {}, tuner: {})",
                    device.index,
                    device.name,
                    device.serial,
                    device.tuner.name()
                );
            }
        }

        Ok(result)
    }

    fn should_skip(&self, device: &DeviceDescriptor) -> bool {
        self.config.skip_serials.iter().any(|s| *s == device.serial)
    }
}

/// Turn a raw transport record into a descriptor
fn describe(info: DeviceInfo) -> DeviceDescriptor {
    let info = DeviceInfo {
        manufacturer: sanitize_string(&info.manufacturer),
        product: sanitize_string(&info.product),
        serial: sanitize_string(&info.serial),
        ..info
    };
    let name = display_name(&info);
    DeviceDescriptor::from_info(info, name)
}

/// Pick a display name: driver name, then known USB ID, then product string
fn display_name(info: &DeviceInfo) -> String {
    if let Some(name) = info.name.as_deref().map(sanitize_string) {
        if !name.is_empty() {
            return name;
        }
    }
    if let Some(name) = info.usb_id.and_then(usb_ids::known_device_name) {
        return name.to_string();
    }
    if !info.product.is_empty() {
        return info.product.clone();
    }
    usb_ids::GENERIC_NAME.to_string()
}

/// Keep only printable ASCII; some sticks ship garbage in their EEPROM strings
fn sanitize_string(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdr_model::{TransportError, TunerType, UsbId};
    use sdr_sim::{SimTransport, VirtualDongleConfig};

    fn catalog_with(sim: &SimTransport) -> DeviceCatalog {
        DeviceCatalog::new(Arc::new(sim.clone()))
    }

    #[test]
    fn test_empty_enumeration_is_not_an_error() {
        let sim = SimTransport::new();
        let devices = catalog_with(&sim).list_devices().unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_enumeration_failure() {
        let sim = SimTransport::new();
        sim.fail_enumeration(Some(TransportError::LibraryNotFound));

        let err = catalog_with(&sim).list_devices().unwrap_err();
        assert!(matches!(
            err,
            DetectError::EnumerationFailed {
                source: TransportError::LibraryNotFound,
                ..
            }
        ));
    }

    #[test]
    fn test_descriptor_carries_tuner_table() {
        let sim = SimTransport::new();
        sim.attach(VirtualDongleConfig::default());

        let devices = catalog_with(&sim).list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].index, 0);
        assert_eq!(devices[0].tuner, TunerType::R820T);
        assert_eq!(devices[0].supported_gains.len(), 29);
        assert_eq!(devices[0].frequency_range.max_hz, 1_766_000_000);
    }

    #[test]
    fn test_fresh_enumeration_each_call() {
        let sim = SimTransport::new();
        let catalog = catalog_with(&sim);
        assert!(catalog.list_devices().unwrap().is_empty());

        sim.attach(VirtualDongleConfig::default());
        assert_eq!(catalog.list_devices().unwrap().len(), 1);

        sim.detach(0);
        assert!(catalog.list_devices().unwrap().is_empty());
    }

    #[test]
    fn test_skip_serials() {
        let sim = SimTransport::new();
        sim.attach(VirtualDongleConfig {
            serial: "ADSB1090".to_string(),
            ..Default::default()
        });
        sim.attach(VirtualDongleConfig {
            serial: "AIS162".to_string(),
            ..Default::default()
        });

        let catalog = DeviceCatalog::with_config(
            Arc::new(sim.clone()),
            CatalogConfig {
                skip_serials: vec!["AIS162".to_string()],
            },
        );
        let devices = catalog.list_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, "ADSB1090");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let base = DeviceInfo::new(0, "Realtek", "RTL2838UHIDIR", "1", TunerType::R820T);

        let named = base.clone().with_name("FlightAware Pro Stick");
        assert_eq!(display_name(&named), "FlightAware Pro Stick");

        let by_id = base.clone().with_usb_id(UsbId::new(0x0BDA, 0x2838));
        assert_eq!(display_name(&by_id), "Generic RTL2832U OEM");

        assert_eq!(display_name(&base), "RTL2838UHIDIR");

        let bare = DeviceInfo::new(0, "", "", "", TunerType::Unknown);
        assert_eq!(display_name(&bare), usb_ids::GENERIC_NAME);
    }

    #[test]
    fn test_sanitize_string() {
        assert_eq!(sanitize_string("  000\u{1}0001\u{7f} "), "0000001");
        assert_eq!(sanitize_string("Realtek"), "Realtek");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitized_strings_are_printable_and_trimmed(raw in any::<String>()) {
                let clean = sanitize_string(&raw);
                prop_assert!(clean.chars().all(|c| c.is_ascii_graphic() || c == ' '));
                prop_assert_eq!(clean.trim(), clean.as_str());
            }

            #[test]
            fn display_name_never_empty(product in "[ -~]{0,16}", name in proptest::option::of("[ -~]{0,16}")) {
                let mut info = DeviceInfo::new(0, "", product, "", sdr_model::TunerType::Unknown);
                info.name = name;
                prop_assert!(!display_name(&info).is_empty());
            }
        }
    }
}
