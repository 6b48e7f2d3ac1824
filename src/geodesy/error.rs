use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeodesyError {
    #[error("non-finite coordinate in distance input")]
    NonFiniteInput,
    #[error("vincenty inverse did not converge after {iterations} iterations")]
    NonConvergent { iterations: u32 },
    #[error("points are antipodal, geodesic is undefined")]
    Antipodal,
}
