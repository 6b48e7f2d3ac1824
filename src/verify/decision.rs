use log::{info, warn};
use serde::Serialize;
use strum_macros::Display;

use crate::geodesy::DistanceAlgorithm;
use crate::location::{FusedEstimate, ReferenceLocation};

/// Accuracy under which a fix is reported as high precision
pub const HIGH_PRECISION_ACCURACY_M: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Precision {
    High,
    Moderate,
}

impl Precision {
    pub fn from_accuracy(accuracy_m: f64) -> Self {
        if accuracy_m < HIGH_PRECISION_ACCURACY_M {
            Precision::High
        } else {
            Precision::Moderate
        }
    }
}

/// Outcome of one verification attempt with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationDecision {
    pub distance_m: f64,
    pub accuracy_m: f64,
    pub within_range: bool,
    pub algorithm: DistanceAlgorithm,
    pub threshold_m: f64,
    pub sample_count: usize,
    pub fallback: bool,
    pub position: FusedEstimate,
}

impl VerificationDecision {
    pub fn precision(&self) -> Precision {
        Precision::from_accuracy(self.accuracy_m)
    }

    /// Distance could not be computed; the attempt is denied.
    pub fn is_indeterminate(&self) -> bool {
        !self.distance_m.is_finite()
    }
}

/// Admit/deny with the default ellipsoidal method.
pub fn decide(
    estimate: &FusedEstimate,
    reference: &ReferenceLocation,
    threshold_m: f64,
) -> VerificationDecision {
    decide_with(
        estimate,
        reference,
        threshold_m,
        DistanceAlgorithm::Vincenty3d,
    )
}

/// Admit/deny. A distance that is not finite never counts as in range.
pub fn decide_with(
    estimate: &FusedEstimate,
    reference: &ReferenceLocation,
    threshold_m: f64,
    algorithm: DistanceAlgorithm,
) -> VerificationDecision {
    let distance_m = algorithm.distance_3d(estimate, reference);
    let within_range = distance_m.is_finite() && distance_m <= threshold_m;

    if !distance_m.is_finite() {
        warn!(
            "Distance from ({:.6}, {:.6}) to reference is undefined, denying",
            estimate.latitude, estimate.longitude
        );
    }
    info!(
        "Location check: distance {:.1}m (allowed {:.0}m), accuracy ±{:.1}m, {} sample(s), {} -> {}",
        distance_m,
        threshold_m,
        estimate.accuracy,
        estimate.sample_count,
        algorithm,
        if within_range { "in range" } else { "out of range" }
    );

    VerificationDecision {
        distance_m,
        accuracy_m: estimate.accuracy,
        within_range,
        algorithm,
        threshold_m,
        sample_count: estimate.sample_count,
        fallback: estimate.fallback,
        position: estimate.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::haversine_distance;
    use chrono::Utc;

    fn estimate(latitude: f64, longitude: f64, altitude: f64, accuracy: f64) -> FusedEstimate {
        FusedEstimate {
            latitude,
            longitude,
            altitude,
            accuracy,
            sample_count: 1,
            timestamp: Utc::now(),
            fallback: false,
        }
    }

    #[test]
    fn test_at_reference_is_in_range() {
        let reference = ReferenceLocation::default();
        let e = estimate(reference.latitude, reference.longitude, 228.0, 5.0);
        let d = decide(&e, &reference, 0.0);
        assert_eq!(d.distance_m, 0.0);
        assert!(d.within_range);
        assert_eq!(d.precision(), Precision::High);
        assert_eq!(d.algorithm, DistanceAlgorithm::Vincenty3d);
    }

    #[test]
    fn test_two_hundred_meters_north() {
        let reference = ReferenceLocation::default();
        let e = estimate(reference.latitude + 0.0018, reference.longitude, 228.0, 10.0);
        let d = decide(&e, &reference, 200.0);
        let approx = haversine_distance(&e, &reference);
        assert!((d.distance_m - approx).abs() / approx < 0.005);
        assert!(d.distance_m > 195.0 && d.distance_m < 205.0);
        // Ellipsoidal meridian arc here is slightly under 200 m
        assert!(d.within_range);
    }

    #[test]
    fn test_altitude_pushes_out_of_range() {
        let reference = ReferenceLocation::default();
        let e = estimate(reference.latitude + 0.0018, reference.longitude, 428.0, 10.0);
        let d = decide(&e, &reference, 200.0);
        assert!(d.distance_m > 280.0);
        assert!(!d.within_range);
    }

    #[test]
    fn test_non_finite_distance_is_denied() {
        let reference = ReferenceLocation {
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
        };
        let e = estimate(0.0, 180.0, 0.0, 5.0);
        let d = decide(&e, &reference, f64::INFINITY);
        assert!(d.is_indeterminate());
        assert!(!d.within_range);
    }

    #[test]
    fn test_haversine_algorithm_tag() {
        let reference = ReferenceLocation::default();
        let e = estimate(reference.latitude, reference.longitude, 228.0, 45.0);
        let d = decide_with(&e, &reference, 200.0, DistanceAlgorithm::Haversine3d);
        assert_eq!(d.algorithm, DistanceAlgorithm::Haversine3d);
        assert_eq!(d.precision(), Precision::Moderate);
    }
}
