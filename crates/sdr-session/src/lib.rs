//! RTL-SDR Session Manager
//!
//! This crate provides exclusive, serialized access to a single RTL-SDR
//! receiver: open a device from the latest listing, negotiate gain and
//! center frequency against its capability table, and release it.
//!
//! # Architecture
//!
//! - A [`SessionManager`] is an ordinary value owned by the caller (share it
//!   with `Arc`); there is no process-global session.
//! - At most one device is open. A second `open` is refused with
//!   `DeviceBusy` rather than silently replacing the session.
//! - Driver calls run on the blocking pool with per-operation deadlines
//!   ([`SessionConfig`]), surfacing stalls as `HardwareTimeout`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sdr_session::{SessionConfig, SessionManager};
//! use sdr_sim::{SimTransport, VirtualDongleConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), sdr_session::SessionError> {
//! let sim = SimTransport::with_dongles([VirtualDongleConfig::default()]);
//! let manager = SessionManager::for_transport(Arc::new(sim), SessionConfig::default());
//!
//! let devices = manager.list_devices().await?;
//! manager.open(devices[0].index, false).await?;
//!
//! // 20 dB snaps to the R820T's 19.7 dB step
//! let gain = manager.set_gain(20.0).await?;
//! assert_eq!(gain.db(), 19.7);
//!
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod state;

pub use error::SessionError;
pub use manager::{SessionConfig, SessionManager};
pub use state::{FreqSettings, GainSettings, RadioSession};
