//! Tuner gain values
//!
//! librtlsdr expresses tuner gain in tenths of a dB. Keeping that integer
//! representation makes gain tables exact, ordered and hashable, while the
//! public API speaks plain dB.

use std::fmt;

/// A tuner gain step, stored in tenths of a dB
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Gain(i32);

impl Gain {
    /// Create from tenths of a dB (librtlsdr's native unit)
    pub const fn from_tenths_db(tenths: i32) -> Self {
        Self(tenths)
    }

    /// Create from dB, rounding to the nearest tenth
    pub fn from_db(db: f64) -> Self {
        Self((db * 10.0).round() as i32)
    }

    /// Gain in tenths of a dB
    pub const fn tenths_db(self) -> i32 {
        self.0
    }

    /// Gain in dB
    pub fn db(self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl fmt::Display for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} dB", self.db())
    }
}

/// Gains serialize as their dB value so records read naturally in JSON
#[cfg(feature = "serde")]
impl serde::Serialize for Gain {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.db())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Gain {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let db = f64::deserialize(deserializer)?;
        if !db.is_finite() {
            return Err(serde::de::Error::custom("gain must be a finite dB value"));
        }
        Ok(Self::from_db(db))
    }
}
