use geo::{Distance, Haversine, Point};

use super::Coordinates;

/// IUGG mean Earth radius (m), the sphere `geo::Haversine` works on
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance on a sphere. Cheaper and less precise than
/// [`super::horizontal_distance`]; kept as a cross-check and as a fallback
/// method selectable in configuration.
pub fn haversine_distance<A, B>(a: &A, b: &B) -> f64
where
    A: Coordinates + ?Sized,
    B: Coordinates + ?Sized,
{
    let from = Point::new(a.longitude_deg(), a.latitude_deg());
    let to = Point::new(b.longitude_deg(), b.latitude_deg());
    Haversine::distance(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_of_longitude_at_equator() {
        let d = haversine_distance(&(0.0, 0.0), &(0.0, 1.0));
        assert!((d - 111_195.08).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_haversine_matches_mean_radius() {
        let quarter = haversine_distance(&(0.0, 0.0), &(0.0, 90.0));
        let expected = MEAN_EARTH_RADIUS_M * std::f64::consts::FRAC_PI_2;
        assert!((quarter - expected).abs() < 1e-6, "got {quarter}");
    }

    #[test]
    fn test_haversine_identity() {
        assert_eq!(haversine_distance(&(31.6, 74.8), &(31.6, 74.8)), 0.0);
    }

    #[test]
    fn test_haversine_nan_input() {
        assert!(haversine_distance(&(f64::NAN, 0.0), &(0.0, 0.0)).is_nan());
    }
}
