//! Seams between the session owner and its readers.
//!
//! The session manager is the only writer of the credential. The gateway and
//! the realtime connection see it through [`CredentialSource`], and the
//! gateway's single permitted mutation goes through [`SessionInvalidator`].

use async_trait::async_trait;

/// Read access to the current bearer credential.
pub trait CredentialSource: Send + Sync {
    /// Current bearer token, if any. Consulted on every request and handshake.
    fn bearer_token(&self) -> Option<String>;
}

/// Clears the session after an authorization failure.
#[async_trait]
pub trait SessionInvalidator: Send + Sync {
    /// Clear the session if `token`, the credential the rejected request
    /// carried, is still the one held. A rejection of an older token leaves
    /// a newer session alone. Returns once local state and the durable store
    /// are both cleared.
    async fn invalidate(&self, token: &str, reason: &str);
}

/// Fixed credential, for tools and tests that do not run a session manager.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredential {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[async_trait]
impl SessionInvalidator for StaticCredential {
    async fn invalidate(&self, _token: &str, _reason: &str) {}
}
