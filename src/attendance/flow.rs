use chrono::Utc;
use log::{debug, info, warn};
use strum_macros::Display;
use uuid::Uuid;

use crate::attendance::{
    student_id_for, AttendanceError, AttendanceRecord, AttendanceStatus, AttendanceStore,
    Identity, IdentityProvider,
};
use crate::location::{LocationProvider, Permission, Sampler};
use crate::verify::{decide_with, GeoFenceVerifier, VerificationDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    NotSignedIn,
    PermissionDenied,
    NoLocationSignal,
    SessionUnavailable,
    AlreadyMarked,
    Error,
}

/// Where one attendance attempt currently stands. `Persisted`, `Denied` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AttemptState {
    Idle,
    RequestingPermission,
    Sampling,
    Fusing,
    Deciding,
    Confirming,
    Persisted,
    Denied,
    Failed(FailureReason),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Persisted | AttemptState::Denied | AttemptState::Failed(_)
        )
    }
}

impl From<&AttendanceError> for FailureReason {
    fn from(err: &AttendanceError) -> Self {
        match err {
            AttendanceError::NotSignedIn | AttendanceError::MissingEmail => {
                FailureReason::NotSignedIn
            }
            AttendanceError::PermissionDenied => FailureReason::PermissionDenied,
            AttendanceError::NoLocationSignal => FailureReason::NoLocationSignal,
            AttendanceError::SessionUnavailable(_) => FailureReason::SessionUnavailable,
            AttendanceError::AlreadyMarked { .. } => FailureReason::AlreadyMarked,
            _ => FailureReason::Error,
        }
    }
}

/// A verified position waiting for the student to confirm.
#[derive(Debug, Clone)]
pub struct PendingMark {
    pub session_id: String,
    pub student: Identity,
    pub student_id: Uuid,
    pub student_email: String,
    pub decision: VerificationDecision,
}

#[derive(Debug, Clone)]
pub enum Attempt {
    Confirming(PendingMark),
    Denied(VerificationDecision),
}

/// Runs attendance attempts: permission, sampling, fusion, decision and,
/// once confirmed, the record insert.
pub struct AttendanceFlow<P, I, S> {
    verifier: GeoFenceVerifier,
    sampler: Sampler,
    provider: P,
    identity: I,
    store: S,
    state: AttemptState,
    // Only set while Confirming, and only from a within-range decision
    pending: Option<PendingMark>,
}

impl<P, I, S> AttendanceFlow<P, I, S>
where
    P: LocationProvider,
    I: IdentityProvider,
    S: AttendanceStore,
{
    pub fn new(
        verifier: GeoFenceVerifier,
        sampler: Sampler,
        provider: P,
        identity: I,
        store: S,
    ) -> Self {
        Self {
            verifier,
            sampler,
            provider,
            identity,
            store,
            state: AttemptState::Idle,
            pending: None,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The mark [`confirm`](Self::confirm) would persist.
    pub fn pending(&self) -> Option<&PendingMark> {
        self.pending.as_ref()
    }

    /// Starts an attempt for `session_id`. An out of range position comes
    /// back as [`Attempt::Denied`], not as an error.
    pub async fn begin(&mut self, session_id: &str) -> Result<Attempt, AttendanceError> {
        self.pending = None;
        self.transition(AttemptState::Idle);
        let result = self.run(session_id).await;
        match &result {
            Ok(Attempt::Confirming(pending)) => {
                self.pending = Some(pending.clone());
                self.transition(AttemptState::Confirming);
            }
            Ok(Attempt::Denied(_)) => self.transition(AttemptState::Denied),
            Err(e) => {
                warn!("Attendance attempt for session {} failed: {}", session_id, e);
                self.transition(AttemptState::Failed(e.into()));
            }
        }
        result
    }

    async fn run(&mut self, session_id: &str) -> Result<Attempt, AttendanceError> {
        let student = self
            .identity
            .current_user()
            .ok_or(AttendanceError::NotSignedIn)?;
        let student_email = student
            .email()
            .ok_or(AttendanceError::MissingEmail)?
            .to_string();

        let session = self.store.session(session_id)?;
        if !session.is_active {
            return Err(AttendanceError::SessionUnavailable(session.id));
        }

        self.transition(AttemptState::RequestingPermission);
        if self.provider.request_permission().await != Permission::Granted {
            return Err(AttendanceError::PermissionDenied);
        }

        self.transition(AttemptState::Sampling);
        let samples = self.sampler.acquire(&mut self.provider).await;

        self.transition(AttemptState::Fusing);
        let estimate = self.verifier.policy.fuse(&samples)?;

        self.transition(AttemptState::Deciding);
        let decision = decide_with(
            &estimate,
            &self.verifier.reference,
            self.verifier.threshold_m,
            self.verifier.algorithm,
        );

        if !decision.within_range {
            return Ok(Attempt::Denied(decision));
        }

        Ok(Attempt::Confirming(PendingMark {
            session_id: session.id,
            student_id: student_id_for(&student_email),
            student_email,
            student,
            decision,
        }))
    }

    /// Persists the mark verified by the last [`begin`](Self::begin). A
    /// second mark for the same session fails with
    /// [`AttendanceError::AlreadyMarked`].
    pub fn confirm(&mut self) -> Result<AttendanceRecord, AttendanceError> {
        let pending = match (self.state, self.pending.take()) {
            (AttemptState::Confirming, Some(pending)) => pending,
            _ => return Err(AttendanceError::NotConfirming),
        };
        if !pending.decision.within_range {
            self.transition(AttemptState::Denied);
            return Err(AttendanceError::OutOfRange {
                distance_m: pending.decision.distance_m,
                threshold_m: pending.decision.threshold_m,
            });
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4(),
            session_id: pending.session_id,
            student_id: pending.student_id,
            student_name: pending.student.display_name().to_string(),
            student_email: pending.student_email,
            status: AttendanceStatus::Present,
            marked_at: Utc::now(),
            distance_m: pending.decision.distance_m,
            accuracy_m: pending.decision.accuracy_m,
            location_verified: pending.decision.within_range,
            algorithm: pending.decision.algorithm,
        };

        match self.store.insert_record(&record) {
            Ok(()) => {
                info!(
                    "Attendance marked for {} in session {} ({:.1}m, ±{:.1}m)",
                    record.student_email, record.session_id, record.distance_m, record.accuracy_m
                );
                self.transition(AttemptState::Persisted);
                Ok(record)
            }
            Err(e) => {
                let err = AttendanceError::from(e);
                self.transition(AttemptState::Failed((&err).into()));
                Err(err)
            }
        }
    }

    /// Drops a pending confirmation.
    pub fn cancel(&mut self) {
        self.pending = None;
        if self.state == AttemptState::Confirming {
            self.transition(AttemptState::Idle);
        }
    }

    fn transition(&mut self, next: AttemptState) {
        debug!("Attempt state: {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{FileStore, StaticIdentity};
    use crate::location::{GeoPoint, ReferenceLocation, ReplayProvider};

    type TestFlow = AttendanceFlow<ReplayProvider, StaticIdentity, FileStore>;

    fn ada() -> StaticIdentity {
        StaticIdentity(Some(Identity {
            id: "auth0|ada".into(),
            email: Some("ada@campus.edu".into()),
            name: Some("Ada".into()),
        }))
    }

    fn on_campus(accuracy: f64) -> GeoPoint {
        let r = ReferenceLocation::default();
        GeoPoint::new(r.latitude, r.longitude)
            .with_altitude(r.elevation)
            .with_accuracy(accuracy)
    }

    fn flow(
        dir: &tempfile::TempDir,
        provider: ReplayProvider,
        identity: StaticIdentity,
    ) -> (TestFlow, String) {
        let store = FileStore::new(dir.path().to_path_buf());
        let session = store.open_session("Physics").unwrap();
        let flow = AttendanceFlow::new(
            GeoFenceVerifier::default(),
            Sampler::default(),
            provider,
            identity,
            store,
        );
        (flow, session.id)
    }

    #[tokio::test]
    async fn test_mark_on_campus() {
        let dir = tempfile::tempdir().unwrap();
        let (mut flow, session) = flow(&dir, ReplayProvider::new(vec![on_campus(5.0)]), ada());

        let pending = match flow.begin(&session).await.unwrap() {
            Attempt::Confirming(p) => p,
            Attempt::Denied(d) => panic!("unexpected denial: {d:?}"),
        };
        assert_eq!(flow.state(), AttemptState::Confirming);
        let distance = pending.decision.distance_m;
        assert!(distance < 0.01);

        let record = flow.confirm().unwrap();
        assert_eq!(flow.state(), AttemptState::Persisted);
        assert_eq!(record.distance_m, distance);
        assert_eq!(record.accuracy_m, 5.0);
        assert!(record.location_verified);
        assert_eq!(record.student_id, student_id_for("ada@campus.edu"));
        assert_eq!(flow.store().records_for_session(&session).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_mark_is_already_marked() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ReplayProvider::new(vec![on_campus(5.0), on_campus(6.0)]);
        let (mut flow, session) = flow(&dir, provider, ada());

        for expect_ok in [true, false] {
            let Attempt::Confirming(_) = flow.begin(&session).await.unwrap() else {
                panic!("expected confirmation");
            };
            let result = flow.confirm();
            if expect_ok {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(AttendanceError::AlreadyMarked { .. })));
                assert_eq!(
                    flow.state(),
                    AttemptState::Failed(FailureReason::AlreadyMarked)
                );
            }
        }
    }

    #[tokio::test]
    async fn test_out_of_range_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let far = GeoPoint::new(31.70, 74.818695)
            .with_altitude(228.0)
            .with_accuracy(10.0);
        let (mut flow, session) = flow(&dir, ReplayProvider::new(vec![far]), ada());

        let Attempt::Denied(decision) = flow.begin(&session).await.unwrap() else {
            panic!("expected denial");
        };
        assert!(decision.distance_m > 5_000.0);
        assert_eq!(flow.state(), AttemptState::Denied);
        assert!(flow.store().records_for_session(&session).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_signal_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let (mut flow, session) = flow(&dir, ReplayProvider::new(vec![]), ada());

        let err = flow.begin(&session).await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoLocationSignal));
        assert!(err.is_retryable());
        assert_eq!(
            flow.state(),
            AttemptState::Failed(FailureReason::NoLocationSignal)
        );
        assert!(flow.store().records_for_session(&session).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ReplayProvider::new(vec![on_campus(5.0)]).deny_permission();
        let (mut flow, session) = flow(&dir, provider, ada());

        let err = flow.begin(&session).await.unwrap_err();
        assert!(matches!(err, AttendanceError::PermissionDenied));
        assert_eq!(
            flow.state(),
            AttemptState::Failed(FailureReason::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_requires_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ReplayProvider::new(vec![on_campus(5.0)]);
        let (mut flow, session) = flow(&dir, provider, StaticIdentity(None));

        assert!(matches!(
            flow.begin(&session).await,
            Err(AttendanceError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_closed_session_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (mut flow, session) = flow(&dir, ReplayProvider::new(vec![on_campus(5.0)]), ada());
        flow.store().close_session(&session).unwrap();

        assert!(matches!(
            flow.begin(&session).await,
            Err(AttendanceError::SessionUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_requires_pending_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let (mut flow, session) = flow(&dir, ReplayProvider::new(vec![on_campus(5.0)]), ada());
        let Attempt::Confirming(_) = flow.begin(&session).await.unwrap() else {
            panic!("expected confirmation");
        };
        flow.cancel();
        assert_eq!(flow.state(), AttemptState::Idle);
        assert!(flow.pending().is_none());
        assert!(matches!(flow.confirm(), Err(AttendanceError::NotConfirming)));
    }

    #[tokio::test]
    async fn test_confirm_ignores_edited_copy_of_mark() {
        let dir = tempfile::tempdir().unwrap();
        let (mut flow, session) = flow(&dir, ReplayProvider::new(vec![on_campus(5.0)]), ada());
        let other = flow.store().open_session("Chemistry").unwrap();

        let Attempt::Confirming(mut copy) = flow.begin(&session).await.unwrap() else {
            panic!("expected confirmation");
        };
        copy.session_id = other.id.clone();
        copy.decision.within_range = false;
        copy.decision.distance_m = 9999.0;

        let record = flow.confirm().unwrap();
        assert_eq!(record.session_id, session);
        assert!(record.distance_m < 0.01);
        assert!(record.location_verified);
        assert!(flow.store().records_for_session(&other.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_from_earlier_attempt_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let far = GeoPoint::new(31.70, 74.818695)
            .with_altitude(228.0)
            .with_accuracy(10.0);
        let provider = ReplayProvider::new(vec![on_campus(5.0), far]);
        let (mut flow, session) = flow(&dir, provider, ada());

        assert!(matches!(
            flow.begin(&session).await.unwrap(),
            Attempt::Confirming(_)
        ));
        assert!(matches!(
            flow.begin(&session).await.unwrap(),
            Attempt::Denied(_)
        ));
        assert!(matches!(flow.confirm(), Err(AttendanceError::NotConfirming)));
        assert!(flow.store().records_for_session(&session).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_mark_is_never_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let (mut flow, session) = flow(&dir, ReplayProvider::new(vec![on_campus(5.0)]), ada());
        flow.begin(&session).await.unwrap();

        let pending = flow.pending.as_mut().unwrap();
        pending.decision.within_range = false;
        pending.decision.distance_m = 9999.0;

        assert!(matches!(
            flow.confirm(),
            Err(AttendanceError::OutOfRange { .. })
        ));
        assert_eq!(flow.state(), AttemptState::Denied);
        assert!(flow.store().records_for_session(&session).unwrap().is_empty());
    }
}
