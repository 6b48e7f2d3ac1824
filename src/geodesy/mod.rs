//! Ellipsoidal distance math used by the geofence check.
//!
//! Everything here is pure: no I/O, no clocks, no shared state. Failures are
//! reported either as a [`GeodesyError`] (the `try`-style entry points) or as
//! a non-finite distance, which callers must treat as "cannot verify".

mod error;
mod haversine;
mod vincenty;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub use error::GeodesyError;
pub use haversine::{haversine_distance, MEAN_EARTH_RADIUS_M};
pub use vincenty::{horizontal_distance, vincenty_inverse};

/// WGS-84 semi-major axis (m)
pub const WGS84_SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;
/// WGS-84 flattening
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;
/// WGS-84 semi-minor axis (m)
pub const WGS84_SEMI_MINOR_AXIS_M: f64 = WGS84_SEMI_MAJOR_AXIS_M * (1.0 - WGS84_FLATTENING);

/// A geodetic position in degrees with an altitude in meters.
pub trait Coordinates {
    fn latitude_deg(&self) -> f64;
    fn longitude_deg(&self) -> f64;
    /// Missing altitudes are reported as 0.
    fn altitude_m(&self) -> f64 {
        0.0
    }
}

/// `(latitude, longitude)` in degrees.
impl Coordinates for (f64, f64) {
    fn latitude_deg(&self) -> f64 {
        self.0
    }

    fn longitude_deg(&self) -> f64 {
        self.1
    }
}

/// `(latitude, longitude, altitude)`.
impl Coordinates for (f64, f64, f64) {
    fn latitude_deg(&self) -> f64 {
        self.0
    }

    fn longitude_deg(&self) -> f64 {
        self.1
    }

    fn altitude_m(&self) -> f64 {
        self.2
    }
}

/// Which horizontal method produced a distance. Persisted with every
/// decision so audits can tell results apart.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
pub enum DistanceAlgorithm {
    #[default]
    #[serde(alias = "vincenty")]
    #[strum(to_string = "vincenty+3d-pythagorean", serialize = "vincenty")]
    Vincenty3d,
    #[serde(alias = "haversine")]
    #[strum(to_string = "haversine+3d-pythagorean", serialize = "haversine")]
    Haversine3d,
}

impl DistanceAlgorithm {
    pub fn horizontal<A, B>(self, a: &A, b: &B) -> f64
    where
        A: Coordinates + ?Sized,
        B: Coordinates + ?Sized,
    {
        match self {
            DistanceAlgorithm::Vincenty3d => horizontal_distance(a, b),
            DistanceAlgorithm::Haversine3d => haversine_distance(a, b),
        }
    }

    /// Horizontal distance combined with the altitude difference.
    pub fn distance_3d<A, B>(self, a: &A, b: &B) -> f64
    where
        A: Coordinates + ?Sized,
        B: Coordinates + ?Sized,
    {
        combine_vertical(self.horizontal(a, b), a.altitude_m() - b.altitude_m())
    }
}

/// Ellipsoidal horizontal distance and altitude difference combined as
/// `sqrt(h² + v²)`.
///
/// This is an engineering approximation: the geodesic and the vertical are
/// not orthogonal at scale. Accepted/denied outcomes depend on it, so it is
/// kept as is.
pub fn distance_3d<A, B>(a: &A, b: &B) -> f64
where
    A: Coordinates + ?Sized,
    B: Coordinates + ?Sized,
{
    DistanceAlgorithm::Vincenty3d.distance_3d(a, b)
}

// NaN must survive here, `hypot` would turn (NaN, inf) into inf.
fn combine_vertical(horizontal: f64, vertical: f64) -> f64 {
    let vertical = vertical.abs();
    (horizontal * horizontal + vertical * vertical).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMPUS: (f64, f64, f64) = (31.649174, 74.818695, 228.0);

    #[test]
    fn test_distance_3d_identity_is_zero() {
        assert_eq!(distance_3d(&CAMPUS, &CAMPUS), 0.0);
        let pole = (90.0, 0.0, -12.5);
        assert_eq!(distance_3d(&pole, &pole), 0.0);
    }

    #[test]
    fn test_distance_3d_pure_vertical() {
        let above = (CAMPUS.0, CAMPUS.1, CAMPUS.2 + 30.0);
        assert!((distance_3d(&CAMPUS, &above) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_3d_combines_axes() {
        let north = (CAMPUS.0 + 0.0009, CAMPUS.1, CAMPUS.2);
        let north_up = (CAMPUS.0 + 0.0009, CAMPUS.1, CAMPUS.2 + 40.0);
        let h = horizontal_distance(&CAMPUS, &north);
        let d = distance_3d(&CAMPUS, &north_up);
        assert!((d - (h * h + 1600.0).sqrt()).abs() < 1e-9);
        assert!(d > h);
    }

    #[test]
    fn test_triangle_inequality() {
        let a = CAMPUS;
        let b = (31.650900, 74.820100, 240.0);
        let c = (31.647000, 74.815500, 210.0);
        let ab = distance_3d(&a, &b);
        let bc = distance_3d(&b, &c);
        let ac = distance_3d(&a, &c);
        assert!(ac <= ab + bc + 1e-9);
    }

    #[test]
    fn test_non_finite_distance_propagates() {
        let bad = (f64::NAN, 74.0, 0.0);
        assert!(distance_3d(&CAMPUS, &bad).is_nan());
        let inf_alt = (CAMPUS.0, f64::NAN, f64::INFINITY);
        assert!(distance_3d(&CAMPUS, &inf_alt).is_nan());
    }

    #[test]
    fn test_algorithm_tags() {
        assert_eq!(
            DistanceAlgorithm::Vincenty3d.to_string(),
            "vincenty+3d-pythagorean"
        );
        assert_eq!(
            "haversine".parse::<DistanceAlgorithm>().unwrap(),
            DistanceAlgorithm::Haversine3d
        );
        let yaml: DistanceAlgorithm = serde_yaml::from_str("vincenty").unwrap();
        assert_eq!(yaml, DistanceAlgorithm::Vincenty3d);
    }
}
