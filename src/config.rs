use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::attendance::FileStore;
use crate::geodesy::DistanceAlgorithm;
use crate::location::{
    AccuracyHint, FusionPolicy, ReferenceLocation, Sampler, DEFAULT_MAX_ACCEPTABLE_ACCURACY_M,
    DEFAULT_MAX_FUSED_SAMPLES, DEFAULT_SAMPLES,
};
use crate::verify::{GeoFenceVerifier, DEFAULT_ALLOWED_DISTANCE_M};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid campus coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Invalid duration for {field}: {message}")]
    Duration { field: &'static str, message: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Every section is optional; an empty file gives the built-in campus.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub campus: CampusConfig,
    pub geofence: GeofenceConfig,
    pub sampling: SamplingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampusConfig {
    pub name: Option<String>,
    /// "lat, lon" in decimal degrees
    pub coordinates: String,
    #[serde(default)]
    pub elevation_m: f64,
}

impl Default for CampusConfig {
    fn default() -> Self {
        let reference = ReferenceLocation::default();
        Self {
            name: None,
            coordinates: format!("{}, {}", reference.latitude, reference.longitude),
            elevation_m: reference.elevation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    pub allowed_distance_m: f64,
    pub max_gps_accuracy_m: f64,
    pub max_fused_samples: usize,
    pub algorithm: DistanceAlgorithm,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            allowed_distance_m: DEFAULT_ALLOWED_DISTANCE_M,
            max_gps_accuracy_m: DEFAULT_MAX_ACCEPTABLE_ACCURACY_M,
            max_fused_samples: DEFAULT_MAX_FUSED_SAMPLES,
            algorithm: DistanceAlgorithm::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub samples: usize,
    /// humantime, e.g. "500ms"
    pub delay: String,
    pub fix_timeout: String,
    pub accuracy_hint: AccuracyHint,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            delay: "0s".to_string(),
            fix_timeout: "10s".to_string(),
            accuracy_hint: AccuracyHint::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub base_folder: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_folder: PathBuf::from("attendance"),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Like [`Config::from_file`], but a missing file means built-in defaults.
    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("{} not found, using built-in defaults", path.display());
            return Ok(Config::default());
        }
        Self::from_file(path)
    }

    /// Parses and validates.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        // An empty document is null, not an empty mapping
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reference()?;
        self.sampler()?;

        let geofence = &self.geofence;
        if !(geofence.allowed_distance_m.is_finite() && geofence.allowed_distance_m > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "allowed_distance_m must be positive, got {}",
                geofence.allowed_distance_m
            )));
        }
        if !(geofence.max_gps_accuracy_m.is_finite() && geofence.max_gps_accuracy_m > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_gps_accuracy_m must be positive, got {}",
                geofence.max_gps_accuracy_m
            )));
        }
        if geofence.max_fused_samples == 0 {
            return Err(ConfigError::Invalid(
                "max_fused_samples must be at least 1".to_string(),
            ));
        }
        if self.sampling.samples == 0 {
            return Err(ConfigError::Invalid(
                "sampling.samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reference(&self) -> Result<ReferenceLocation, ConfigError> {
        ReferenceLocation::from_coordinates(&self.campus.coordinates, Some(self.campus.elevation_m))
            .ok_or_else(|| ConfigError::InvalidCoordinates(self.campus.coordinates.clone()))
    }

    pub fn verifier(&self) -> Result<GeoFenceVerifier, ConfigError> {
        Ok(GeoFenceVerifier {
            reference: self.reference()?,
            threshold_m: self.geofence.allowed_distance_m,
            policy: FusionPolicy {
                max_acceptable_accuracy_m: self.geofence.max_gps_accuracy_m,
                max_samples: self.geofence.max_fused_samples,
            },
            algorithm: self.geofence.algorithm,
        })
    }

    pub fn sampler(&self) -> Result<Sampler, ConfigError> {
        Ok(Sampler {
            samples: self.sampling.samples,
            delay: parse_duration("sampling.delay", &self.sampling.delay)?,
            fix_timeout: parse_duration("sampling.fix_timeout", &self.sampling.fix_timeout)?,
            hint: self.sampling.accuracy_hint,
        })
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(self.storage.base_folder.clone())
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Duration {
        field,
        message: e.to_string(),
    })
}
