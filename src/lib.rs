pub mod attendance;
pub mod config;
pub mod geodesy;
pub mod location;
pub mod verify;

pub use config::{Config, ConfigError, DEFAULT_CONFIG_FILE};
pub use geodesy::{distance_3d, DistanceAlgorithm};
pub use location::{fuse, FusedEstimate, GeoPoint, LocationError, ReferenceLocation};
pub use verify::{decide, GeoFenceVerifier, VerificationDecision};
