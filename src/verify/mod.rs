mod decision;

use crate::geodesy::DistanceAlgorithm;
use crate::location::{FusionPolicy, GeoPoint, LocationError, ReferenceLocation};

pub use decision::{
    decide, decide_with, Precision, VerificationDecision, HIGH_PRECISION_ACCURACY_M,
};

pub const DEFAULT_ALLOWED_DISTANCE_M: f64 = 200.0;

/// Reference point, threshold and fusion rules for one campus.
#[derive(Debug, Clone)]
pub struct GeoFenceVerifier {
    pub reference: ReferenceLocation,
    pub threshold_m: f64,
    pub policy: FusionPolicy,
    pub algorithm: DistanceAlgorithm,
}

impl Default for GeoFenceVerifier {
    fn default() -> Self {
        Self {
            reference: ReferenceLocation::default(),
            threshold_m: DEFAULT_ALLOWED_DISTANCE_M,
            policy: FusionPolicy::default(),
            algorithm: DistanceAlgorithm::default(),
        }
    }
}

impl GeoFenceVerifier {
    pub fn new(reference: ReferenceLocation, threshold_m: f64) -> Self {
        Self {
            reference,
            threshold_m,
            ..Self::default()
        }
    }

    /// Fuses the samples and decides. Only a missing signal is an error; an
    /// out of range position is a normal decision.
    pub fn verify(&self, samples: &[GeoPoint]) -> Result<VerificationDecision, LocationError> {
        let estimate = self.policy.fuse(samples)?;
        Ok(decide_with(
            &estimate,
            &self.reference,
            self.threshold_m,
            self.algorithm,
        ))
    }
}
