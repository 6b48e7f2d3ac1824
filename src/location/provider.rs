use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::location::{GeoPoint, LocationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
}

/// Desired precision passed through to the platform location service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccuracyHint {
    Lowest,
    Low,
    #[default]
    Balanced,
    High,
    Highest,
}

/// Device location service.
pub trait LocationProvider {
    fn request_permission(&mut self) -> impl Future<Output = Permission> + Send;

    /// One fix. A failed call counts as no sample for that round.
    fn current_fix(
        &mut self,
        hint: AccuracyHint,
    ) -> impl Future<Output = Result<GeoPoint, LocationError>> + Send;
}

/// Serves pre-recorded fixes in order. Backs the command line tool and
/// tests.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    fixes: VecDeque<GeoPoint>,
    permission: Permission,
}

impl ReplayProvider {
    pub fn new(fixes: Vec<GeoPoint>) -> Self {
        Self {
            fixes: fixes.into(),
            permission: Permission::Granted,
        }
    }

    /// Loads a YAML list of fixes.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LocationError> {
        let content = std::fs::read_to_string(path)?;
        let fixes: Vec<GeoPoint> = serde_yaml::from_str(&content)?;
        Ok(Self::new(fixes))
    }

    pub fn deny_permission(mut self) -> Self {
        self.permission = Permission::Denied;
        self
    }

    pub fn remaining(&self) -> usize {
        self.fixes.len()
    }
}

impl LocationProvider for ReplayProvider {
    async fn request_permission(&mut self) -> Permission {
        self.permission
    }

    async fn current_fix(&mut self, _hint: AccuracyHint) -> Result<GeoPoint, LocationError> {
        if self.permission == Permission::Denied {
            return Err(LocationError::PermissionDenied);
        }
        self.fixes
            .pop_front()
            .ok_or_else(|| LocationError::Provider("no more recorded fixes".into()))
    }
}
