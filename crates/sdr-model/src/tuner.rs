//! Tuner chip database
//!
//! RTL2832U dongles pair the demodulator with one of a handful of tuner
//! chips. The tuner decides both the discrete gain steps and the tunable
//! frequency range, so capability tables are keyed by tuner type. Gain
//! tables match the values librtlsdr reports from `rtlsdr_get_tuner_gains`.

use crate::descriptor::FrequencyRange;
use crate::gain::Gain;

/// Tuner chip fitted to an RTL2832U receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TunerType {
    /// Elonics E4000
    E4000,
    /// Fitipower FC0012
    Fc0012,
    /// Fitipower FC0013
    Fc0013,
    /// FCI FC2580
    Fc2580,
    /// Rafael Micro R820T/R820T2 (most common on ADS-B sticks)
    R820T,
    /// Rafael Micro R828D
    R828D,
    /// Tuner could not be identified
    #[default]
    Unknown,
}

impl TunerType {
    /// Map librtlsdr's `enum rtlsdr_tuner` value
    pub fn from_librtlsdr(code: i32) -> Self {
        match code {
            1 => Self::E4000,
            2 => Self::Fc0012,
            3 => Self::Fc0013,
            4 => Self::Fc2580,
            5 => Self::R820T,
            6 => Self::R828D,
            _ => Self::Unknown,
        }
    }

    /// Returns a human-readable name for the tuner
    pub fn name(&self) -> &'static str {
        match self {
            Self::E4000 => "Elonics E4000",
            Self::Fc0012 => "Fitipower FC0012",
            Self::Fc0013 => "Fitipower FC0013",
            Self::Fc2580 => "FCI FC2580",
            Self::R820T => "Rafael Micro R820T",
            Self::R828D => "Rafael Micro R828D",
            Self::Unknown => "Unknown",
        }
    }
}

/// Capabilities of a tuner chip (static version for database)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunerCapabilitiesStatic {
    /// Discrete gain steps in tenths of a dB, ascending
    pub gains_tenth_db: &'static [i32],
    /// Minimum tunable frequency in Hz
    pub min_frequency_hz: u64,
    /// Maximum tunable frequency in Hz
    pub max_frequency_hz: u64,
}

/// Capabilities of a tuner chip (owned version)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TunerCapabilities {
    /// Discrete gain steps, ascending and unique
    pub gains: Vec<Gain>,
    /// Inclusive tunable range
    pub frequency_range: FrequencyRange,
}

impl From<TunerCapabilitiesStatic> for TunerCapabilities {
    fn from(s: TunerCapabilitiesStatic) -> Self {
        Self {
            gains: s
                .gains_tenth_db
                .iter()
                .copied()
                .map(Gain::from_tenths_db)
                .collect(),
            frequency_range: FrequencyRange::new(s.min_frequency_hz, s.max_frequency_hz),
        }
    }
}

/// Database of known tuner chips
pub struct TunerDatabase;

impl TunerDatabase {
    /// Look up the capabilities of a tuner
    pub fn capabilities(tuner: TunerType) -> TunerCapabilities {
        TUNERS
            .iter()
            .find(|(t, _)| *t == tuner)
            .map(|(_, caps)| (*caps).into())
            .unwrap_or_else(|| UNKNOWN_TUNER.into())
    }

    /// Iterate over every known tuner and its capabilities
    pub fn tuners() -> impl Iterator<Item = (TunerType, TunerCapabilities)> {
        TUNERS.iter().map(|(t, caps)| (*t, (*caps).into()))
    }
}

static E4K_GAINS: &[i32] = &[
    -10, 15, 40, 65, 90, 115, 140, 165, 190, 215, 240, 290, 340, 420,
];

static FC0012_GAINS: &[i32] = &[-99, -40, 71, 179, 192];

static FC0013_GAINS: &[i32] = &[
    -99, -73, -65, -63, -60, -58, -54, 58, 61, 63, 65, 67, 68, 70, 71, 179, 181, 182, 184, 186,
    188, 191, 197,
];

// FC2580 has no programmable gain; librtlsdr reports a single 0 dB step
static FC2580_GAINS: &[i32] = &[0];

static R82XX_GAINS: &[i32] = &[
    0, 9, 14, 27, 37, 77, 87, 125, 144, 157, 166, 197, 207, 229, 254, 280, 297, 328, 338, 364,
    372, 386, 402, 421, 434, 439, 445, 480, 496,
];

static R82XX_CAPS: TunerCapabilitiesStatic = TunerCapabilitiesStatic {
    gains_tenth_db: R82XX_GAINS,
    min_frequency_hz: 24_000_000,
    max_frequency_hz: 1_766_000_000,
};

// Unidentified tuners cannot be gain-stepped; the range is the RTL2832U default
static UNKNOWN_TUNER: TunerCapabilitiesStatic = TunerCapabilitiesStatic {
    gains_tenth_db: &[],
    min_frequency_hz: 24_000_000,
    max_frequency_hz: 1_766_000_000,
};

static TUNERS: &[(TunerType, TunerCapabilitiesStatic)] = &[
    (
        TunerType::E4000,
        TunerCapabilitiesStatic {
            gains_tenth_db: E4K_GAINS,
            min_frequency_hz: 52_000_000,
            max_frequency_hz: 2_200_000_000,
        },
    ),
    (
        TunerType::Fc0012,
        TunerCapabilitiesStatic {
            gains_tenth_db: FC0012_GAINS,
            min_frequency_hz: 22_000_000,
            max_frequency_hz: 948_600_000,
        },
    ),
    (
        TunerType::Fc0013,
        TunerCapabilitiesStatic {
            gains_tenth_db: FC0013_GAINS,
            min_frequency_hz: 22_000_000,
            max_frequency_hz: 1_100_000_000,
        },
    ),
    (
        TunerType::Fc2580,
        TunerCapabilitiesStatic {
            gains_tenth_db: FC2580_GAINS,
            min_frequency_hz: 146_000_000,
            max_frequency_hz: 924_000_000,
        },
    ),
    (TunerType::R820T, R82XX_CAPS),
    (TunerType::R828D, R82XX_CAPS),
];
