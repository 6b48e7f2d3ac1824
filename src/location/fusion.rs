use std::cmp::Ordering;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::location::{FusedEstimate, GeoPoint, LocationError};

/// Fixes worse than this are unusable for a ~200 m geofence
pub const DEFAULT_MAX_ACCEPTABLE_ACCURACY_M: f64 = 200.0;
pub const DEFAULT_MAX_FUSED_SAMPLES: usize = 3;
/// Accuracy reported for a fallback fix that carried none
pub const FALLBACK_ACCURACY_M: f64 = 999.0;
/// Weight floor: every accuracy below 1 m, 0 included, weighs the same as
/// 1 m. Sub-metre fixes get no extra weight over a 1 m fix.
const MIN_WEIGHT_ACCURACY_M: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionPolicy {
    pub max_acceptable_accuracy_m: f64,
    pub max_samples: usize,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self {
            max_acceptable_accuracy_m: DEFAULT_MAX_ACCEPTABLE_ACCURACY_M,
            max_samples: DEFAULT_MAX_FUSED_SAMPLES,
        }
    }
}

/// Fuses with the default sample cap.
pub fn fuse(
    samples: &[GeoPoint],
    max_acceptable_accuracy_m: f64,
) -> Result<FusedEstimate, LocationError> {
    FusionPolicy {
        max_acceptable_accuracy_m,
        ..FusionPolicy::default()
    }
    .fuse(samples)
}

impl FusionPolicy {
    /// Turns raw fixes into one position estimate.
    ///
    /// Fixes within the accuracy limit are averaged with weight
    /// `1 / accuracy`, best first, up to `max_samples`. If none qualifies the
    /// single best fix is returned as is. No valid fix at all is
    /// [`LocationError::NoLocationSignal`].
    pub fn fuse(&self, samples: &[GeoPoint]) -> Result<FusedEstimate, LocationError> {
        let valid: Vec<&GeoPoint> = samples
            .iter()
            .filter(|sample| match sample.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Discarding location sample: {}", e);
                    false
                }
            })
            .collect();

        if valid.is_empty() {
            return Err(LocationError::NoLocationSignal);
        }

        let mut accepted: Vec<(f64, &GeoPoint)> = valid
            .iter()
            .filter_map(|sample| {
                sample
                    .usable_accuracy()
                    .filter(|accuracy| *accuracy <= self.max_acceptable_accuracy_m)
                    .map(|accuracy| (accuracy, *sample))
            })
            .collect();

        if accepted.is_empty() {
            return Ok(self.fallback(&valid));
        }

        accepted.sort_by(|a, b| compare_samples(a.0, a.1, b.0, b.1));
        accepted.truncate(self.max_samples.max(1));

        // Coordinates are averaged as offsets from the best fix. Longitude
        // offsets are wrapped so fixes on both sides of the antimeridian stay
        // together.
        let anchor = accepted[0].1;
        let anchor_alt = anchor.altitude_or_zero();
        let mut total_weight = 0.0;
        let (mut lat_offset, mut lon_offset, mut alt_offset) = (0.0, 0.0, 0.0);
        for (accuracy, sample) in &accepted {
            let weight = 1.0 / accuracy.max(MIN_WEIGHT_ACCURACY_M);
            total_weight += weight;
            lat_offset += (sample.latitude - anchor.latitude) * weight;
            lon_offset += wrap_degrees(sample.longitude - anchor.longitude) * weight;
            alt_offset += (sample.altitude_or_zero() - anchor_alt) * weight;
        }

        let estimate = FusedEstimate {
            latitude: anchor.latitude + lat_offset / total_weight,
            longitude: wrap_degrees(anchor.longitude + lon_offset / total_weight),
            altitude: anchor_alt + alt_offset / total_weight,
            accuracy: accepted[0].0,
            sample_count: accepted.len(),
            timestamp: accepted
                .iter()
                .map(|(_, s)| s.timestamp)
                .max()
                .unwrap_or_else(|| accepted[0].1.timestamp),
            fallback: false,
        };
        debug!(
            "Fused {} of {} samples: ({:.6}, {:.6}) ±{:.1}m",
            estimate.sample_count,
            samples.len(),
            estimate.latitude,
            estimate.longitude,
            estimate.accuracy
        );
        Ok(estimate)
    }

    fn fallback(&self, valid: &[&GeoPoint]) -> FusedEstimate {
        let rank = |s: &GeoPoint| s.usable_accuracy().unwrap_or(f64::INFINITY);
        let best = valid
            .iter()
            .copied()
            .min_by(|a, b| compare_samples(rank(a), a, rank(b), b))
            .unwrap_or(valid[0]);

        let accuracy = best.usable_accuracy().unwrap_or(FALLBACK_ACCURACY_M);
        warn!(
            "No sample within {}m, falling back to best fix with accuracy {}m",
            self.max_acceptable_accuracy_m, accuracy
        );

        FusedEstimate {
            latitude: best.latitude,
            longitude: best.longitude,
            altitude: best.altitude_or_zero(),
            accuracy,
            sample_count: 1,
            timestamp: best.timestamp,
            fallback: true,
        }
    }
}

// Total order over samples so fusion does not depend on input order.
fn compare_samples(acc_a: f64, a: &GeoPoint, acc_b: f64, b: &GeoPoint) -> Ordering {
    acc_a
        .total_cmp(&acc_b)
        .then_with(|| a.latitude.total_cmp(&b.latitude))
        .then_with(|| a.longitude.total_cmp(&b.longitude))
        .then_with(|| a.altitude_or_zero().total_cmp(&b.altitude_or_zero()))
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}

fn wrap_degrees(value: f64) -> f64 {
    if (-180.0..=180.0).contains(&value) {
        value
    } else {
        (value + 180.0).rem_euclid(360.0) - 180.0
    }
}
