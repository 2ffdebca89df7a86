//! Session state and settings snapshots

use sdr_model::{FrequencyRange, Gain};
use serde::{Deserialize, Serialize};

/// State of the (single) radio session
///
/// The default value is the closed session: no device, nothing applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioSession {
    /// Index of the open device
    pub device_index: Option<u32>,
    /// Whether a device is held
    pub is_open: bool,
    /// Tuner automatic gain control enabled
    pub auto_gain_control: bool,
    /// Gain last applied in manual mode
    pub current_gain: Option<Gain>,
    /// Center frequency last applied
    pub current_frequency_hz: Option<u64>,
}

impl RadioSession {
    /// The closed session
    pub fn closed() -> Self {
        Self::default()
    }
}

/// Gain capabilities plus the current setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainSettings {
    /// Supported gain steps, ascending
    pub supported: Vec<Gain>,
    /// Gain currently applied (unset under AGC or before the first set)
    pub current: Option<Gain>,
    /// Tuner AGC enabled
    pub auto_gain_control: bool,
}

/// Tunable range plus the current setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreqSettings {
    /// Inclusive tunable range
    pub range: FrequencyRange,
    /// Center frequency currently applied
    pub current: Option<u64>,
}
