use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_STUDENT_NAME: &str = "Student";

/// The signed-in user as reported by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider subject
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_STUDENT_NAME)
    }

    pub fn email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

pub trait IdentityProvider {
    fn current_user(&self) -> Option<Identity>;
}

/// Fixed identity, or nobody signed in.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<Identity>);

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<Identity> {
        self.0.clone()
    }
}

/// Stable student id derived from the e-mail address.
pub fn student_id_for(email: &str) -> Uuid {
    let normalized = email.trim().to_lowercase();
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("mailto:{}", normalized).as_bytes())
}
