//! Session state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserProfile;

/// Authentication status of the process-wide session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    /// A token is held but has not been confirmed by the server yet.
    Verifying,
    Authenticated,
}

/// Why the session changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum ChangeReason {
    Login,
    Logout,
    /// Persisted credentials were loaded at startup.
    Restored,
    /// Verification started for a held token.
    VerifyStarted,
    Verified,
    VerificationFailed(String),
    /// Cleared by another component, e.g. a 401 on an authenticated call.
    Invalidated(String),
}

/// Payload delivered to session listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChange {
    pub previous: SessionStatus,
    pub current: SessionStatus,
    pub reason: ChangeReason,
    pub user: Option<UserProfile>,
    pub at: DateTime<Utc>,
}

impl SessionChange {
    /// True when this change moved the session into `Authenticated`.
    pub fn became_authenticated(&self) -> bool {
        self.current == SessionStatus::Authenticated && self.previous != SessionStatus::Authenticated
    }

    /// True when this change left the session without credentials.
    pub fn became_unauthenticated(&self) -> bool {
        self.current == SessionStatus::Unauthenticated
            && self.previous != SessionStatus::Unauthenticated
    }
}

/// Read-only view of the session. It never carries the token itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
    pub has_token: bool,
}
