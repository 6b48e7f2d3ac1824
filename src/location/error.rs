use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location permission not granted")]
    PermissionDenied,
    #[error("no location signal: enable location services or move outdoors")]
    NoLocationSignal,
    #[error("invalid sample: {0}")]
    InvalidSample(String),
    #[error("location fix timed out after {0:?}")]
    Timeout(Duration),
    #[error("location provider error: {0}")]
    Provider(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
