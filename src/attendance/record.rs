use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::geodesy::DistanceAlgorithm;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

/// A class period students can mark attendance for while it is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub id: String,
    pub class_name: String,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A persisted attendance mark. Never modified once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub session_id: String,
    pub student_id: Uuid,
    pub student_email: String,
    pub student_name: String,
    pub status: AttendanceStatus,
    pub marked_at: DateTime<Utc>,
    pub distance_m: f64,
    pub accuracy_m: f64,
    pub location_verified: bool,
    pub algorithm: DistanceAlgorithm,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

impl AttendanceSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        records
            .into_iter()
            .fold(Self::default(), |mut summary, record| {
                summary.total += 1;
                match record.status {
                    AttendanceStatus::Present => summary.present += 1,
                    AttendanceStatus::Absent => summary.absent += 1,
                    AttendanceStatus::Late => summary.late += 1,
                }
                summary
            })
    }

    /// Share of sessions attended, late counting as attended.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.present + self.late) as f64 * 100.0 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            session_id: "s".into(),
            student_id: Uuid::nil(),
            student_email: "a@b.c".into(),
            student_name: "A".into(),
            status,
            marked_at: Utc::now(),
            distance_m: 12.0,
            accuracy_m: 5.0,
            location_verified: true,
            algorithm: DistanceAlgorithm::Vincenty3d,
        }
    }

    #[test]
    fn test_summary_counts() {
        let records = [
            record(AttendanceStatus::Present),
            record(AttendanceStatus::Present),
            record(AttendanceStatus::Late),
            record(AttendanceStatus::Absent),
        ];
        let summary = AttendanceSummary::from_records(&records);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.present, 2);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.percentage(), 75.0);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(AttendanceSummary::default().percentage(), 0.0);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(AttendanceStatus::Present.to_string(), "present");
        assert_eq!(
            "late".parse::<AttendanceStatus>().unwrap(),
            AttendanceStatus::Late
        );
    }
}
