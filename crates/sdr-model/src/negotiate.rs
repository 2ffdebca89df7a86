//! Capability negotiation
//!
//! Resolves a requested gain or frequency against a device's capability
//! table. Everything here is pure: no I/O and no state, so a failed
//! resolution can never leave a session half-configured.
//!
//! - Gain snaps to the nearest supported step; equidistant requests resolve
//!   to the lower step.
//! - Frequency is passed through when inside the tunable range and refused
//!   otherwise. There is no clamping: tuning a receiver somewhere it was not
//!   asked to go is worse than failing.

use tracing::trace;

use crate::descriptor::{DeviceDescriptor, FrequencyRange};
use crate::error::CapabilityError;
use crate::gain::Gain;

/// Resolve a requested gain (dB) to a step the device supports
pub fn resolve_gain(device: &DeviceDescriptor, requested_db: f64) -> Result<Gain, CapabilityError> {
    nearest_gain(&device.supported_gains, requested_db)
}

/// Resolve a requested center frequency against the device's range
pub fn resolve_frequency(device: &DeviceDescriptor, requested_hz: u64) -> Result<u64, CapabilityError> {
    check_frequency(device.frequency_range, requested_hz)
}

/// Pick the entry of `supported` closest to `requested_db`
///
/// Does not require `supported` to be sorted.
pub fn nearest_gain(supported: &[Gain], requested_db: f64) -> Result<Gain, CapabilityError> {
    if supported.is_empty() {
        return Err(CapabilityError::UnsupportedCapability);
    }
    if !requested_db.is_finite() {
        return Err(CapabilityError::InvalidGain(requested_db));
    }

    // Exact match compared in dB so that 19.7 finds the 197-tenths step
    if let Some(exact) = supported.iter().copied().find(|g| g.db() == requested_db) {
        return Ok(exact);
    }

    // Distances in tenths keep midpoints like 26.25 dB exact for tie-breaking
    let requested = requested_db * 10.0;
    let mut best = supported[0];
    let mut best_distance = distance(best, requested);

    for &gain in &supported[1..] {
        let d = distance(gain, requested);
        if d < best_distance || (d == best_distance && gain < best) {
            best = gain;
            best_distance = d;
        }
    }

    trace!("Resolved gain request {} dB to {}", requested_db, best);
    Ok(best)
}

fn distance(gain: Gain, requested_tenths: f64) -> f64 {
    (f64::from(gain.tenths_db()) - requested_tenths).abs()
}

/// Accept `requested_hz` if it lies within `range`
pub fn check_frequency(range: FrequencyRange, requested_hz: u64) -> Result<u64, CapabilityError> {
    if range.contains(requested_hz) {
        Ok(requested_hz)
    } else {
        Err(CapabilityError::OutOfRange {
            requested_hz,
            min_hz: range.min_hz,
            max_hz: range.max_hz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuner::{TunerDatabase, TunerType};
    use crate::ADSB_FREQUENCY_HZ;
    use proptest::prelude::*;

    fn device(gains_db: &[f64], range: (u64, u64)) -> DeviceDescriptor {
        DeviceDescriptor::new(
            0,
            "Test",
            "00000001",
            gains_db.iter().map(|&db| Gain::from_db(db)),
            FrequencyRange::new(range.0, range.1),
        )
    }

    fn adsb_stick() -> DeviceDescriptor {
        device(&[0.0, 9.0, 19.7, 32.8], (24_000_000, 1_766_000_000))
    }

    #[test]
    fn test_nearest_gain_scenario() {
        let gain = resolve_gain(&adsb_stick(), 20.0).unwrap();
        assert_eq!(gain, Gain::from_tenths_db(197));
    }

    #[test]
    fn test_exact_gain_returned() {
        let d = adsb_stick();
        assert_eq!(resolve_gain(&d, 19.7).unwrap().db(), 19.7);
        assert_eq!(resolve_gain(&d, 0.0).unwrap().db(), 0.0);
        assert_eq!(resolve_gain(&d, 32.8).unwrap().db(), 32.8);
    }

    #[test]
    fn test_tie_breaks_toward_lower() {
        let d = device(&[10.0, 20.0], (1, 2));
        assert_eq!(resolve_gain(&d, 15.0).unwrap().db(), 10.0);

        // Midpoint between 19.7 and 32.8
        assert_eq!(resolve_gain(&adsb_stick(), 26.25).unwrap().db(), 19.7);
    }

    #[test]
    fn test_out_of_table_requests_snap_to_ends() {
        let d = adsb_stick();
        assert_eq!(resolve_gain(&d, -40.0).unwrap().db(), 0.0);
        assert_eq!(resolve_gain(&d, 100.0).unwrap().db(), 32.8);
    }

    #[test]
    fn test_empty_gain_table_unsupported() {
        let d = device(&[], (1, 2));
        assert_eq!(
            resolve_gain(&d, 10.0),
            Err(CapabilityError::UnsupportedCapability)
        );
    }

    #[test]
    fn test_non_finite_gain_rejected() {
        let d = adsb_stick();
        assert!(matches!(
            resolve_gain(&d, f64::NAN),
            Err(CapabilityError::InvalidGain(_))
        ));
        assert!(matches!(
            resolve_gain(&d, f64::INFINITY),
            Err(CapabilityError::InvalidGain(_))
        ));
    }

    #[test]
    fn test_adsb_frequency_unchanged() {
        assert_eq!(
            resolve_frequency(&adsb_stick(), ADSB_FREQUENCY_HZ),
            Ok(ADSB_FREQUENCY_HZ)
        );
    }

    #[test]
    fn test_frequency_out_of_range() {
        let d = adsb_stick();
        assert_eq!(
            resolve_frequency(&d, 2_000_000_000),
            Err(CapabilityError::OutOfRange {
                requested_hz: 2_000_000_000,
                min_hz: 24_000_000,
                max_hz: 1_766_000_000,
            })
        );
        assert!(resolve_frequency(&d, 0).is_err());
    }

    #[test]
    fn test_r820t_table_snaps_common_requests() {
        let caps = TunerDatabase::capabilities(TunerType::R820T);
        assert_eq!(nearest_gain(&caps.gains, 40.0).unwrap().db(), 40.2);
        assert_eq!(nearest_gain(&caps.gains, 50.0).unwrap().db(), 49.6);
    }

    fn gain_table() -> impl Strategy<Value = Vec<Gain>> {
        prop::collection::vec(-100i32..600, 1..32)
            .prop_map(|tenths| tenths.into_iter().map(Gain::from_tenths_db).collect())
    }

    proptest! {
        #[test]
        fn resolved_gain_is_supported(gains in gain_table(), requested in -20.0f64..70.0) {
            let resolved = nearest_gain(&gains, requested).unwrap();
            prop_assert!(gains.contains(&resolved));
        }

        #[test]
        fn resolved_gain_is_nearest(gains in gain_table(), requested in -20.0f64..70.0) {
            let resolved = nearest_gain(&gains, requested).unwrap();
            let best = distance(resolved, requested * 10.0);
            for g in &gains {
                prop_assert!(distance(*g, requested * 10.0) >= best);
            }
        }

        #[test]
        fn frequency_identity_inside_range(
            min in 1u64..1_000_000_000,
            span in 0u64..2_000_000_000,
            offset in 0u64..2_000_000_000,
        ) {
            let range = FrequencyRange::new(min, min + span);
            let hz = min + offset % (span + 1);
            prop_assert_eq!(check_frequency(range, hz), Ok(hz));
        }

        #[test]
        fn frequency_rejected_outside_range(
            min in 1_000u64..1_000_000_000,
            span in 0u64..2_000_000_000,
            below in 1u64..1_000,
            above in 1u64..1_000_000,
        ) {
            let range = FrequencyRange::new(min, min + span);
            let is_out_of_range = |r: Result<u64, CapabilityError>| {
                matches!(r, Err(CapabilityError::OutOfRange { .. }))
            };
            prop_assert!(is_out_of_range(check_frequency(range, min - below)));
            prop_assert!(is_out_of_range(check_frequency(range, min + span + above)));
        }
    }
}
