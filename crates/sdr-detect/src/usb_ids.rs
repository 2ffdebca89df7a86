//! USB Vendor/Product ID database for known RTL2832U receivers
//!
//! Most RTL-SDR sticks started life as DVB-T TV dongles, so they appear under
//! a long tail of retail VID/PID pairs. The table mirrors the devices
//! librtlsdr recognizes and is used to give devices a readable name when the
//! transport does not supply one.

use sdr_model::UsbId;

/// Realtek reference designs (the bulk of ADS-B sticks)
pub mod realtek {
    use super::UsbId;

    pub const VID: u16 = 0x0BDA;

    pub const RTL2832U: UsbId = UsbId::new(VID, 0x2832);
    pub const RTL2838_OEM: UsbId = UsbId::new(VID, 0x2838);
}

/// Terratec branded sticks
pub mod terratec {
    pub const VID: u16 = 0x0CCD;
}

/// Dexatek / Logilink / MSI sticks
pub mod dexatek {
    pub const VID: u16 = 0x1D19;
}

/// Generic name used when nothing better is known
pub const GENERIC_NAME: &str = "Generic RTL2832U";

static KNOWN_DONGLES: &[(UsbId, &str)] = &[
    (realtek::RTL2832U, "Generic RTL2832U"),
    (realtek::RTL2838_OEM, "Generic RTL2832U OEM"),
    (UsbId::new(0x0413, 0x6680), "DigitalNow Quad DVB-T PCI-E card"),
    (UsbId::new(0x0413, 0x6F0F), "Leadtek WinFast DTV Dongle mini D"),
    (UsbId::new(0x0458, 0x707F), "Genius TVGo DVB-T03 USB dongle (Ver. B)"),
    (UsbId::new(terratec::VID, 0x00A9), "Terratec Cinergy T Stick Black (rev 1)"),
    (UsbId::new(terratec::VID, 0x00B3), "Terratec NOXON DAB/DAB+ USB dongle (rev 1)"),
    (UsbId::new(terratec::VID, 0x00D3), "Terratec Cinergy T Stick RC (Rev.3)"),
    (UsbId::new(terratec::VID, 0x00D7), "Terratec T Stick PLUS"),
    (UsbId::new(terratec::VID, 0x00E0), "Terratec NOXON DAB/DAB+ USB dongle (rev 2)"),
    (UsbId::new(0x15F4, 0x0131), "Astrometa DVB-T/DVB-T2"),
    (UsbId::new(0x185B, 0x0620), "Compro Videomate U620F"),
    (UsbId::new(0x185B, 0x0650), "Compro Videomate U650F"),
    (UsbId::new(0x1B80, 0xD393), "GIGABYTE GT-U7300"),
    (UsbId::new(0x1B80, 0xD39D), "SVEON STV20 DVB-T USB & FM"),
    (UsbId::new(dexatek::VID, 0x1101), "Dexatek DK DVB-T Dongle (Logilink VG0002A)"),
    (UsbId::new(dexatek::VID, 0x1102), "Dexatek DK DVB-T Dongle (MSI DigiVox mini II V3.0)"),
    (UsbId::new(dexatek::VID, 0x1104), "MSI DigiVox Micro HD"),
    (UsbId::new(0x1F4D, 0xB803), "GTek T803"),
    (UsbId::new(0x1F4D, 0xD286), "MyGica TD312"),
];

/// Look up the retail name of a known dongle
pub fn known_device_name(id: UsbId) -> Option<&'static str> {
    KNOWN_DONGLES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}
