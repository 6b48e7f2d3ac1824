mod error;
mod fusion;
mod provider;
mod sampler;
mod types;

pub use error::LocationError;
pub use fusion::{
    fuse, FusionPolicy, DEFAULT_MAX_ACCEPTABLE_ACCURACY_M, DEFAULT_MAX_FUSED_SAMPLES,
    FALLBACK_ACCURACY_M,
};
pub use provider::{AccuracyHint, LocationProvider, Permission, ReplayProvider};
pub use sampler::{Sampler, DEFAULT_FIX_TIMEOUT, DEFAULT_SAMPLES};
pub use types::{FusedEstimate, GeoPoint, ReferenceLocation};
