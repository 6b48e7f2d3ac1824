use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{error, warn};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::attendance::{AttendanceRecord, AttendanceSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session is closed: {0}")]
    SessionClosed(String),
    #[error("Attendance already marked for student {student_id} in session {session_id}")]
    AlreadyMarked {
        session_id: String,
        student_id: Uuid,
    },
}

/// Row store for sessions and attendance marks.
pub trait AttendanceStore {
    fn open_session(&self, class_name: &str) -> Result<AttendanceSession, StoreError>;
    fn close_session(&self, id: &str) -> Result<AttendanceSession, StoreError>;
    fn session(&self, id: &str) -> Result<AttendanceSession, StoreError>;
    /// Active sessions, newest first.
    fn active_sessions(&self) -> Result<Vec<AttendanceSession>, StoreError>;
    /// Fails with [`StoreError::AlreadyMarked`] when the student already has
    /// a record for the session.
    fn insert_record(&self, record: &AttendanceRecord) -> Result<(), StoreError>;
    fn records_for_session(&self, session_id: &str) -> Result<Vec<AttendanceRecord>, StoreError>;
    fn records_for_student(&self, student_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError>;
}

/// YAML files on disk:
/// `sessions/<id>.yaml` and `records/<session>/<student>.yaml`.
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: PathBuf) -> Self {
        FileStore { base }
    }

    fn sessions_path(&self) -> PathBuf {
        self.base.join("sessions")
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_path().join(format!("{}.yaml", id))
    }

    fn records_path(&self) -> PathBuf {
        self.base.join("records")
    }

    fn session_records_path(&self, session_id: &str) -> PathBuf {
        self.records_path().join(session_id)
    }

    fn record_path(&self, session_id: &str, student_id: Uuid) -> PathBuf {
        self.session_records_path(session_id)
            .join(format!("{}.yaml", student_id))
    }

    fn save_session(&self, session: &AttendanceSession) -> Result<(), StoreError> {
        fs::create_dir_all(self.sessions_path())?;
        fs::write(
            self.session_path(&session.id),
            serde_yaml::to_string(session)?,
        )?;
        Ok(())
    }

    fn generate_id(&self, start: DateTime<Utc>) -> String {
        let uuid = Uuid::new_v4();
        let timestamp = start.format("%Y%m%dT%H%M%SZ");
        format!("{}_{}", timestamp, uuid)
    }
}

impl AttendanceStore for FileStore {
    fn open_session(&self, class_name: &str) -> Result<AttendanceSession, StoreError> {
        let started_at = Utc::now();
        let session = AttendanceSession {
            id: self.generate_id(started_at),
            class_name: class_name.to_string(),
            is_active: true,
            started_at,
            ended_at: None,
        };
        self.save_session(&session)?;
        Ok(session)
    }

    fn close_session(&self, id: &str) -> Result<AttendanceSession, StoreError> {
        let mut session = self.session(id)?;
        if session.is_active {
            session.is_active = false;
            session.ended_at = Some(Utc::now());
            self.save_session(&session)?;
        }
        Ok(session)
    }

    fn session(&self, id: &str) -> Result<AttendanceSession, StoreError> {
        let path = self.session_path(id);
        if !is_plain_id(id) || !path.exists() {
            return Err(StoreError::SessionNotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn active_sessions(&self) -> Result<Vec<AttendanceSession>, StoreError> {
        let mut sessions: Vec<AttendanceSession> =
            read_yaml_dir::<AttendanceSession>(&self.sessions_path())?
                .into_iter()
                .filter(|s| s.is_active)
                .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    fn insert_record(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        let session = self.session(&record.session_id)?;
        if !session.is_active {
            return Err(StoreError::SessionClosed(session.id));
        }

        let dir = self.session_records_path(&record.session_id);
        fs::create_dir_all(&dir)?;
        let path = self.record_path(&record.session_id, record.student_id);
        let content = serde_yaml::to_string(record)?;

        // Written in full under a temporary name, then linked into place.
        // hard_link fails on an existing file: one record per student.
        let tmp = dir.join(format!(".{}.{}.tmp", record.student_id, Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, content) {
            remove_temp(&tmp);
            return Err(e.into());
        }
        let linked = fs::hard_link(&tmp, &path);
        remove_temp(&tmp);

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::AlreadyMarked {
                session_id: record.session_id.clone(),
                student_id: record.student_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn records_for_session(&self, session_id: &str) -> Result<Vec<AttendanceRecord>, StoreError> {
        if !is_plain_id(session_id) {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }
        let mut records: Vec<AttendanceRecord> =
            read_yaml_dir(&self.session_records_path(session_id))?;
        records.sort_by_key(|r| r.marked_at);
        Ok(records)
    }

    fn records_for_student(&self, student_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut records: Vec<AttendanceRecord> = Vec::new();
        for entry in path.read_dir()? {
            let session_dir = entry?.path();
            if !session_dir.is_dir() {
                continue;
            }
            let record_path = session_dir.join(format!("{}.yaml", student_id));
            if !record_path.is_file() {
                continue;
            }
            match read_yaml(&record_path) {
                Ok(record) => records.push(record),
                Err(e) => error!("Failed to read record {}: {}", record_path.display(), e),
            }
        }

        records.sort_by(|a, b| b.marked_at.cmp(&a.marked_at));
        Ok(records)
    }
}

// Ids become file names
fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "yaml")
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

// Unreadable entries are logged and skipped so one bad file does not hide
// the rest.
fn read_yaml_dir<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    for entry in path.read_dir()? {
        let entry_path = entry?.path();
        if !entry_path.is_file() || !is_yaml(&entry_path) {
            continue;
        }
        match read_yaml(&entry_path) {
            Ok(item) => items.push(item),
            Err(e) => error!("Failed to read {}: {}", entry_path.display(), e),
        }
    }
    Ok(items)
}
