//! RTL-SDR Device Detection Library
//!
//! This crate enumerates attached RTL2832U receivers through a pluggable
//! [`RadioTransport`](sdr_model::RadioTransport) and turns the raw driver
//! records into [`DeviceDescriptor`](sdr_model::DeviceDescriptor)s carrying
//! the tuner's capability table.
//!
//! With the `librtlsdr` feature enabled, [`LibRtlSdr`] binds the system
//! librtlsdr at runtime and talks to real hardware.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sdr_detect::{DeviceCatalog, LibRtlSdr};
//!
//! let catalog = DeviceCatalog::new(Arc::new(LibRtlSdr::load()?));
//! for device in catalog.list_devices()? {
//!     println!("#{} {} (SN {})", device.index, device.name, device.serial);
//! }
//! ```

pub mod catalog;
pub mod error;
#[cfg(feature = "librtlsdr")]
pub mod librtlsdr;
pub mod usb_ids;

pub use catalog::{CatalogConfig, DeviceCatalog};
pub use error::DetectError;
#[cfg(feature = "librtlsdr")]
pub use librtlsdr::LibRtlSdr;
