use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geodesy::Coordinates;
use crate::location::LocationError;

/// Campus center used when no reference is configured
pub const DEFAULT_CAMPUS_LATITUDE: f64 = 31.649174;
pub const DEFAULT_CAMPUS_LONGITUDE: f64 = 74.818695;
pub const DEFAULT_CAMPUS_ELEVATION_M: f64 = 228.0;

/// A raw fix as reported by the device location service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal error radius in meters. `None` means unbounded.
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Rejects fixes that cannot be placed on the globe.
    pub fn validate(&self) -> Result<(), LocationError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(LocationError::InvalidSample(format!(
                "non-finite coordinates ({}, {})",
                self.latitude, self.longitude
            )));
        }
        if self.latitude.abs() > 90.0 {
            return Err(LocationError::InvalidSample(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }
        if self.longitude.abs() > 180.0 {
            return Err(LocationError::InvalidSample(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Reported accuracy if it is a usable radius. Negative, NaN and infinite
    /// values count as missing.
    pub fn usable_accuracy(&self) -> Option<f64> {
        self.accuracy.filter(|a| a.is_finite() && *a >= 0.0)
    }

    pub fn altitude_or_zero(&self) -> f64 {
        self.altitude.filter(|a| a.is_finite()).unwrap_or(0.0)
    }
}

impl Coordinates for GeoPoint {
    fn latitude_deg(&self) -> f64 {
        self.latitude
    }

    fn longitude_deg(&self) -> f64 {
        self.longitude
    }

    fn altitude_m(&self) -> f64 {
        self.altitude_or_zero()
    }
}

/// The fixed point every decision is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Default for ReferenceLocation {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_CAMPUS_LATITUDE,
            longitude: DEFAULT_CAMPUS_LONGITUDE,
            elevation: DEFAULT_CAMPUS_ELEVATION_M,
        }
    }
}

impl ReferenceLocation {
    /// Parses `"lat, lon"`.
    pub fn from_coordinates(coordinates: &str, elevation_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return None;
        }
        let latitude: f64 = parts[0].parse().ok()?;
        let longitude: f64 = parts[1].parse().ok()?;
        let reference = Self {
            latitude,
            longitude,
            elevation: elevation_m.unwrap_or(0.0),
        };
        reference.is_valid().then_some(reference)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.elevation.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

impl Coordinates for ReferenceLocation {
    fn latitude_deg(&self) -> f64 {
        self.latitude
    }

    fn longitude_deg(&self) -> f64 {
        self.longitude
    }

    fn altitude_m(&self) -> f64 {
        self.elevation
    }
}

/// Best-estimate position built from one or more fixes. Never stored on its
/// own, only through the decision made from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedEstimate {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Best accuracy among the samples used
    pub accuracy: f64,
    pub sample_count: usize,
    /// Latest capture time among the samples used
    pub timestamp: DateTime<Utc>,
    /// Set when no sample met the accuracy limit and the single best fix was
    /// taken instead.
    pub fallback: bool,
}

impl Coordinates for FusedEstimate {
    fn latitude_deg(&self) -> f64 {
        self.latitude
    }

    fn longitude_deg(&self) -> f64 {
        self.longitude
    }

    fn altitude_m(&self) -> f64 {
        self.altitude
    }
}
