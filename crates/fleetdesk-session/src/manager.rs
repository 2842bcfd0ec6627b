//! Session manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fleetdesk_core::{ListenerSet, Subscription};
use fleetdesk_protocols::{
    AuthError, ChangeReason, CredentialSource, SessionChange, SessionInvalidator,
    SessionSnapshot, SessionStatus, UserProfile,
};

use crate::api::AuthApi;
use crate::store::TokenStore;

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserProfile>,
    status: SessionStatus,
}

impl SessionState {
    fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none() && self.status == SessionStatus::Unauthenticated
    }

    fn reset(&mut self) {
        self.token = None;
        self.user = None;
        self.status = SessionStatus::Unauthenticated;
    }
}

/// Owner of the process-wide session.
///
/// The manager is the only writer of both the in-memory session and the
/// [`TokenStore`]. Login, verify, logout and clear are serialized against each
/// other, so a verify that finishes after a logout can never resurrect the
/// session. Reads ([`snapshot`](Self::snapshot), [`CredentialSource`]) never
/// wait on those flows.
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    api: Arc<dyn AuthApi>,
    state: Mutex<SessionState>,
    listeners: ListenerSet<SessionChange>,
    flow: tokio::sync::Mutex<()>,
    server_logout: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>, api: Arc<dyn AuthApi>) -> Self {
        Self {
            store,
            api,
            state: Mutex::new(SessionState::default()),
            listeners: ListenerSet::new(),
            flow: tokio::sync::Mutex::new(()),
            server_logout: Mutex::new(None),
        }
    }

    /// Load persisted credentials. A stored token puts the session in
    /// `Verifying` until [`verify_session`](Self::verify_session) settles it.
    pub async fn restore(&self) -> SessionSnapshot {
        let _flow = self.flow.lock().await;

        match self.store.load().await {
            Ok(stored) => match stored.token {
                Some(token) => {
                    if let Some(user) = &stored.user {
                        debug!("Restored session for user {}", user.id);
                    }
                    self.transition(ChangeReason::Restored, |state| {
                        state.token = Some(token);
                        state.user = stored.user;
                        state.status = SessionStatus::Verifying;
                    });
                }
                None if stored.user.is_some() => {
                    warn!("Cached profile without a token, discarding it");
                    self.wipe_store().await;
                }
                None => {}
            },
            Err(e) => {
                warn!("Token store unreadable, starting signed out: {}", e);
                self.wipe_store().await;
            }
        }

        self.snapshot()
    }

    /// Exchange credentials for a token. Nothing is stored unless the server
    /// accepts them. Never retried.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<UserProfile, AuthError> {
        let _flow = self.flow.lock().await;

        let grant = self.api.login(identifier, secret).await.map_err(|e| {
            warn!("Login rejected: {}", e);
            e
        })?;
        self.store.save(&grant.token, &grant.user).await?;

        info!("Logged in as user {}", grant.user.id);
        let user = grant.user.clone();
        self.transition(ChangeReason::Login, |state| {
            state.token = Some(grant.token);
            state.user = Some(grant.user);
            state.status = SessionStatus::Authenticated;
        });
        Ok(user)
    }

    /// Confirm the held token with the server.
    ///
    /// Returns `false` without any network call when no token is held. Any
    /// failure, rejection or network, clears the session and returns `false`.
    pub async fn verify_session(&self) -> bool {
        let _flow = self.flow.lock().await;

        let Some(token) = self.state.lock().token.clone() else {
            return false;
        };

        if self.status() != SessionStatus::Verifying {
            self.transition(ChangeReason::VerifyStarted, |state| {
                state.status = SessionStatus::Verifying;
            });
        }

        match self.api.verify(&token).await {
            Ok(user) => {
                if let Err(e) = self.store.save_user(&user).await {
                    warn!("Failed to cache verified profile: {}", e);
                }
                info!("Session verified for user {}", user.id);
                self.transition(ChangeReason::Verified, |state| {
                    state.user = Some(user);
                    state.status = SessionStatus::Authenticated;
                });
                true
            }
            Err(e) => {
                warn!("Session verification failed: {}", e);
                self.wipe_store().await;
                self.transition(ChangeReason::VerificationFailed(e.to_string()), SessionState::reset);
                false
            }
        }
    }

    /// Sign out. The in-memory session is cleared and listeners are told
    /// before the store or the server is touched. The server notification is
    /// not awaited; see [`wait_server_logout`](Self::wait_server_logout).
    ///
    /// Returns an error only when the store could not be cleared; the
    /// in-memory session is signed out regardless.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _flow = self.flow.lock().await;

        let (token, was_empty) = {
            let state = self.state.lock();
            (state.token.clone(), state.is_empty())
        };
        if !was_empty {
            info!("Logged out");
            self.transition(ChangeReason::Logout, SessionState::reset);
        }

        let cleared = self.store.clear().await;

        if let Some(token) = token {
            let api = self.api.clone();
            let handle = tokio::spawn(async move {
                if let Err(e) = api.logout(&token).await {
                    warn!("Server logout failed: {}", e);
                }
            });
            *self.server_logout.lock() = Some(handle);
        }

        cleared.map_err(|e| {
            warn!("Failed to clear token store on logout: {}", e);
            AuthError::from(e)
        })
    }

    /// Give the last server logout notification up to `limit` to finish.
    /// Returns false if it was still in flight when the limit passed.
    pub async fn wait_server_logout(&self, limit: Duration) -> bool {
        let pending = self.server_logout.lock().take();
        let Some(handle) = pending else {
            return true;
        };
        match tokio::time::timeout(limit, handle).await {
            Ok(_) => true,
            Err(_) => {
                debug!("Server logout still pending after {:?}", limit);
                false
            }
        }
    }

    /// Drop the session after an authorization failure elsewhere.
    /// No listener is notified when nothing was held.
    pub async fn clear(&self, reason: &str) {
        let _flow = self.flow.lock().await;
        self.clear_held(reason).await;
    }

    /// Like [`clear`](Self::clear), but only while `token` is still the held
    /// credential. Returns whether the session was cleared.
    pub async fn clear_token(&self, token: &str, reason: &str) -> bool {
        let _flow = self.flow.lock().await;

        if self.state.lock().token.as_deref() != Some(token) {
            debug!("Ignoring rejection of a token that is no longer held ({})", reason);
            return false;
        }
        self.clear_held(reason).await
    }

    /// Register a listener for session transitions.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionChange) + Send + Sync + 'static,
    {
        self.listeners.register(listener)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            status: state.status,
            user: state.user.clone(),
            has_token: state.token.is_some(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    async fn clear_held(&self, reason: &str) -> bool {
        if self.state.lock().is_empty() {
            return false;
        }

        info!("Session cleared: {}", reason);
        self.transition(ChangeReason::Invalidated(reason.to_string()), SessionState::reset);
        self.wipe_store().await;
        true
    }

    async fn wipe_store(&self) {
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear token store: {}", e);
        }
    }

    /// Apply `update` under the state lock, then notify outside it.
    fn transition<F>(&self, reason: ChangeReason, update: F)
    where
        F: FnOnce(&mut SessionState),
    {
        let change = {
            let mut state = self.state.lock();
            let previous = state.status;
            update(&mut state);
            SessionChange {
                previous,
                current: state.status,
                reason,
                user: state.user.clone(),
                at: Utc::now(),
            }
        };

        debug!("Session {:?} -> {:?}", change.previous, change.current);
        let failed = self.listeners.emit(&change);
        if failed > 0 {
            warn!("{} session listener(s) panicked", failed);
        }
    }
}

impl CredentialSource for SessionManager {
    fn bearer_token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }
}

#[async_trait]
impl SessionInvalidator for SessionManager {
    async fn invalidate(&self, token: &str, reason: &str) {
        self.clear_token(token, reason).await;
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
