mod error;
mod flow;
mod identity;
mod record;
mod storage;

pub use error::AttendanceError;
pub use flow::{Attempt, AttemptState, AttendanceFlow, FailureReason, PendingMark};
pub use identity::{
    student_id_for, Identity, IdentityProvider, StaticIdentity, DEFAULT_STUDENT_NAME,
};
pub use record::{AttendanceRecord, AttendanceSession, AttendanceStatus, AttendanceSummary};
pub use storage::{AttendanceStore, FileStore, StoreError};
