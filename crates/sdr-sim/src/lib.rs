//! RTL-SDR Simulation Library
//!
//! This crate provides a simulated transport for exercising device
//! enumeration and session control without physical hardware. It includes:
//!
//! - **SimTransport**: a hot-pluggable set of virtual dongles implementing
//!   `RadioTransport`, with fault injection (enumeration failures, one-shot
//!   operation failures, artificial latency to mimic a wedged USB stick)
//! - **VirtualDongle**: the `RadioDevice` handed out by `open`, which records
//!   every setting applied to it
//!
//! # Example
//!
//! ```rust
//! use sdr_model::{GainMode, RadioTransport};
//! use sdr_sim::{SimTransport, VirtualDongleConfig};
//!
//! let sim = SimTransport::new();
//! let index = sim.attach(VirtualDongleConfig::default());
//!
//! let mut dongle = sim.open(index).unwrap();
//! dongle.set_gain_mode(GainMode::Auto).unwrap();
//! dongle.set_center_frequency(1_090_000_000).unwrap();
//!
//! let state = sim.state(index).unwrap();
//! assert!(state.open);
//! assert_eq!(state.center_frequency_hz, Some(1_090_000_000));
//!
//! dongle.close().unwrap();
//! assert!(!sim.state(index).unwrap().open);
//! ```

pub mod dongle;
pub mod transport;

pub use dongle::{DongleState, VirtualDongle, VirtualDongleConfig};
pub use transport::{SimOp, SimTransport};
