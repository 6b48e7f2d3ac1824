use log::warn;

use super::{
    Coordinates, GeodesyError, WGS84_FLATTENING, WGS84_SEMI_MAJOR_AXIS_M, WGS84_SEMI_MINOR_AXIS_M,
};

const MAX_ITERATIONS: u32 = 100;
const CONVERGENCE_TOLERANCE_RAD: f64 = 1e-12;

/// Shortest distance on the WGS-84 ellipsoid between two points, in meters.
///
/// Returns `0.0` for coincident points and `NaN` when the distance cannot be
/// computed (non-finite input, near-antipodal points). A `NaN` here means
/// "cannot verify"; it must never be read as "close enough".
pub fn horizontal_distance<A, B>(a: &A, b: &B) -> f64
where
    A: Coordinates + ?Sized,
    B: Coordinates + ?Sized,
{
    match vincenty_inverse(a, b) {
        Ok(distance) => distance,
        Err(e) => {
            warn!(
                "Geodesic distance undefined between ({}, {}) and ({}, {}): {}",
                a.latitude_deg(),
                a.longitude_deg(),
                b.latitude_deg(),
                b.longitude_deg(),
                e
            );
            f64::NAN
        }
    }
}

/// Vincenty's inverse formula. Iterates the longitude on the auxiliary
/// sphere until it moves by less than 1e-12 rad, giving up after 100 rounds.
pub fn vincenty_inverse<A, B>(a: &A, b: &B) -> Result<f64, GeodesyError>
where
    A: Coordinates + ?Sized,
    B: Coordinates + ?Sized,
{
    inverse_with_limit(a, b, MAX_ITERATIONS)
}

fn inverse_with_limit<A, B>(a: &A, b: &B, max_iterations: u32) -> Result<f64, GeodesyError>
where
    A: Coordinates + ?Sized,
    B: Coordinates + ?Sized,
{
    let (lat1, lon1) = (a.latitude_deg(), a.longitude_deg());
    let (lat2, lon2) = (b.latitude_deg(), b.longitude_deg());
    if ![lat1, lon1, lat2, lon2].iter().all(|v| v.is_finite()) {
        return Err(GeodesyError::NonFiniteInput);
    }

    let f = WGS84_FLATTENING;
    let l = (lon2 - lon1).to_radians();
    // Reduced latitudes
    let u1 = ((1.0 - f) * lat1.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * lat2.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..max_iterations {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let cross = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2) + cross * cross).sqrt();
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;

        if sin_sigma == 0.0 {
            return if cos_sigma > 0.0 {
                Ok(0.0)
            } else {
                Err(GeodesyError::Antipodal)
            };
        }

        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Both points on the equator
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };

        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() <= CONVERGENCE_TOLERANCE_RAD {
            return Ok(ellipsoidal_arc(
                cos_sq_alpha,
                sigma,
                sin_sigma,
                cos_sigma,
                cos_2sigma_m,
            ));
        }
    }

    Err(GeodesyError::NonConvergent {
        iterations: max_iterations,
    })
}

fn ellipsoidal_arc(
    cos_sq_alpha: f64,
    sigma: f64,
    sin_sigma: f64,
    cos_sigma: f64,
    cos_2sigma_m: f64,
) -> f64 {
    let a = WGS84_SEMI_MAJOR_AXIS_M;
    let b = WGS84_SEMI_MINOR_AXIS_M;
    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let cos_2sigma_m_sq = cos_2sigma_m * cos_2sigma_m;
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m_sq)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m_sq)));

    b * big_a * (sigma - delta_sigma)
}
