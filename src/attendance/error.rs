use thiserror::Error;

use crate::attendance::StoreError;
use crate::location::LocationError;

/// Errors surfaced to the person marking attendance. Each kind calls for a
/// different action, so they are kept apart.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("please sign in to mark attendance")]
    NotSignedIn,
    #[error("unable to get your e-mail address, please sign in again")]
    MissingEmail,
    #[error("location permission is required to mark attendance")]
    PermissionDenied,
    #[error("could not get a GPS reading, check that location services are enabled and move away from buildings")]
    NoLocationSignal,
    #[error("attendance already marked for session {session_id}")]
    AlreadyMarked { session_id: String },
    #[error("session {0} is not open for attendance")]
    SessionUnavailable(String),
    #[error("you are {distance_m:.0}m away from campus, you must be within {threshold_m:.0}m to mark attendance")]
    OutOfRange { distance_m: f64, threshold_m: f64 },
    #[error("no verified attempt is waiting for confirmation")]
    NotConfirming,
    #[error("location error: {0}")]
    Location(LocationError),
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl AttendanceError {
    /// Whether trying again without changing anything may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AttendanceError::NoLocationSignal
                | AttendanceError::Location(_)
                | AttendanceError::Store(_)
        )
    }
}

impl From<LocationError> for AttendanceError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => AttendanceError::PermissionDenied,
            LocationError::NoLocationSignal => AttendanceError::NoLocationSignal,
            other => AttendanceError::Location(other),
        }
    }
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyMarked { session_id, .. } => {
                AttendanceError::AlreadyMarked { session_id }
            }
            StoreError::SessionNotFound(id) | StoreError::SessionClosed(id) => {
                AttendanceError::SessionUnavailable(id)
            }
            other => AttendanceError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_store_conflict_is_already_marked() {
        let err = AttendanceError::from(StoreError::AlreadyMarked {
            session_id: "s1".into(),
            student_id: Uuid::nil(),
        });
        assert!(matches!(err, AttendanceError::AlreadyMarked { ref session_id } if session_id == "s1"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_hint() {
        assert!(AttendanceError::from(LocationError::NoLocationSignal).is_retryable());
        assert!(!AttendanceError::from(LocationError::PermissionDenied).is_retryable());
        assert!(!AttendanceError::OutOfRange {
            distance_m: 450.0,
            threshold_m: 200.0
        }
        .is_retryable());
    }
}
