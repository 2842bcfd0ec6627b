use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::api::LoginGrant;
use crate::{FileTokenStore, MemoryTokenStore, StoreKeys};

#[derive(Clone, Copy, PartialEq)]
enum LogoutMode {
    Ok,
    Hang,
}

struct FakeAuthApi {
    password: String,
    valid_tokens: Mutex<Vec<String>>,
    logout_mode: LogoutMode,
    login_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl FakeAuthApi {
    fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            valid_tokens: Mutex::new(Vec::new()),
            logout_mode: LogoutMode::Ok,
            login_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    fn hanging_logout(mut self) -> Self {
        self.logout_mode = LogoutMode::Hang;
        self
    }

    fn revoke_all(&self) {
        self.valid_tokens.lock().clear();
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, identifier: &str, secret: &str) -> Result<LoginGrant, AuthError> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst);
        if secret != self.password {
            return Err(AuthError::InvalidCredentials("Wrong email or password".to_string()));
        }
        let token = format!("tok-{}", n);
        self.valid_tokens.lock().push(token.clone());
        Ok(LoginGrant {
            token,
            user: UserProfile::new("u-1").with_email(identifier),
        })
    }

    async fn verify(&self, token: &str) -> Result<UserProfile, AuthError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.valid_tokens.lock().iter().any(|t| t == token) {
            Ok(UserProfile::new("u-1").with_name("Dana"))
        } else {
            Err(AuthError::SessionExpired("token rejected".to_string()))
        }
    }

    async fn logout(&self, _token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_mode == LogoutMode::Hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Memory store whose `clear` takes a while.
struct SlowClearStore {
    inner: MemoryTokenStore,
    delay: Duration,
}

#[async_trait]
impl TokenStore for SlowClearStore {
    async fn load(&self) -> Result<crate::StoredCredentials, fleetdesk_protocols::StorageError> {
        self.inner.load().await
    }

    async fn save(&self, token: &str, user: &UserProfile) -> Result<(), fleetdesk_protocols::StorageError> {
        self.inner.save(token, user).await
    }

    async fn save_user(&self, user: &UserProfile) -> Result<(), fleetdesk_protocols::StorageError> {
        self.inner.save_user(user).await
    }

    async fn clear(&self) -> Result<(), fleetdesk_protocols::StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.clear().await
    }
}

fn manager_with(store: Arc<MemoryTokenStore>, api: Arc<FakeAuthApi>) -> SessionManager {
    SessionManager::new(store, api)
}

fn recorder(manager: &SessionManager) -> (Arc<Mutex<Vec<SessionChange>>>, Subscription) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let sub = manager.on_change(move |change| sink.lock().push(change.clone()));
    (log, sub)
}

#[tokio::test]
async fn test_verify_without_token_makes_no_call() {
    let api = Arc::new(FakeAuthApi::new("pw"));
    let manager = manager_with(Arc::new(MemoryTokenStore::new()), api.clone());
    let (log, _sub) = recorder(&manager);

    assert!(!manager.verify_session().await);
    assert_eq!(api.verify_calls.load(Ordering::SeqCst), 0);
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_wrong_credentials_persist_nothing() {
    let store = Arc::new(MemoryTokenStore::new());
    let manager = manager_with(store.clone(), Arc::new(FakeAuthApi::new("pw")));
    let (log, _sub) = recorder(&manager);

    let err = manager.login("a@b.com", "pw1").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(manager.bearer_token().is_none());
    assert!(store.is_empty());
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn test_login_stores_and_notifies() {
    let store = Arc::new(MemoryTokenStore::new());
    let manager = manager_with(store.clone(), Arc::new(FakeAuthApi::new("pw")));
    let (log, _sub) = recorder(&manager);

    let user = manager.login("a@b.com", "pw").await.unwrap();
    assert_eq!(user.email.as_deref(), Some("a@b.com"));
    assert!(manager.is_authenticated());
    assert_eq!(manager.bearer_token().as_deref(), Some("tok-0"));
    assert_eq!(store.raw("auth_token").as_deref(), Some("tok-0"));

    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].reason, ChangeReason::Login);
    assert!(log[0].became_authenticated());
}

#[tokio::test]
async fn test_restart_then_verify_restores_user() {
    let store = Arc::new(MemoryTokenStore::new());
    let api = Arc::new(FakeAuthApi::new("pw"));
    {
        let manager = manager_with(store.clone(), api.clone());
        manager.login("a@b.com", "pw").await.unwrap();
    }

    let manager = manager_with(store.clone(), api.clone());
    let (log, _sub) = recorder(&manager);
    let snapshot = manager.restore().await;
    assert_eq!(snapshot.status, SessionStatus::Verifying);
    assert!(snapshot.has_token);
    assert_eq!(
        snapshot.user.as_ref().and_then(|u| u.email.as_deref()),
        Some("a@b.com")
    );

    assert!(manager.verify_session().await);
    assert!(manager.is_authenticated());
    assert_eq!(manager.user().and_then(|u| u.name), Some("Dana".to_string()));
    assert_eq!(api.login_calls.load(Ordering::SeqCst), 1);

    let reasons: Vec<_> = log.lock().iter().map(|c| c.reason.clone()).collect();
    assert_eq!(reasons, vec![ChangeReason::Restored, ChangeReason::Verified]);
}

#[tokio::test]
async fn test_restart_with_file_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let api = Arc::new(FakeAuthApi::new("pw"));
    {
        let store = Arc::new(FileTokenStore::new(dir.path().to_path_buf(), StoreKeys::default()));
        SessionManager::new(store, api.clone())
            .login("a@b.com", "pw")
            .await
            .unwrap();
    }

    let store = Arc::new(FileTokenStore::new(dir.path().to_path_buf(), StoreKeys::default()));
    let manager = SessionManager::new(store, api);
    manager.restore().await;
    assert!(manager.verify_session().await);
}

#[tokio::test]
async fn test_verify_failure_clears_everything() {
    let store = Arc::new(MemoryTokenStore::new());
    let api = Arc::new(FakeAuthApi::new("pw"));
    let manager = manager_with(store.clone(), api.clone());
    manager.login("a@b.com", "pw").await.unwrap();
    api.revoke_all();

    let (log, _sub) = recorder(&manager);
    assert!(!manager.verify_session().await);
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(manager.user().is_none());
    assert!(store.is_empty());

    let log = log.lock();
    assert_eq!(log[0].reason, ChangeReason::VerifyStarted);
    assert_eq!(log[0].current, SessionStatus::Verifying);
    assert!(matches!(log[1].reason, ChangeReason::VerificationFailed(_)));
    assert!(log[1].became_unauthenticated());
}

#[tokio::test]
async fn test_logout_does_not_wait_for_server() {
    let store = Arc::new(MemoryTokenStore::new());
    let api = Arc::new(FakeAuthApi::new("pw").hanging_logout());
    let manager = manager_with(store.clone(), api.clone());
    manager.login("a@b.com", "pw").await.unwrap();
    let (log, _sub) = recorder(&manager);

    tokio::time::timeout(Duration::from_secs(1), manager.logout())
        .await
        .expect("logout must not block on the server")
        .unwrap();

    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(manager.bearer_token().is_none());
    assert!(store.is_empty());
    assert_eq!(log.lock()[0].reason, ChangeReason::Logout);

    tokio::task::yield_now().await;
    assert_eq!(api.logout_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_logout_when_signed_out_is_silent() {
    let api = Arc::new(FakeAuthApi::new("pw"));
    let manager = manager_with(Arc::new(MemoryTokenStore::new()), api.clone());
    let (log, _sub) = recorder(&manager);

    manager.logout().await.unwrap();
    tokio::task::yield_now().await;
    assert!(log.lock().is_empty());
    assert_eq!(api.logout_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_listener_does_not_corrupt_state() {
    let manager = manager_with(Arc::new(MemoryTokenStore::new()), Arc::new(FakeAuthApi::new("pw")));
    let _boom = manager.on_change(|_| panic!("listener failure"));
    let (log, _sub) = recorder(&manager);

    manager.login("a@b.com", "pw").await.unwrap();
    assert!(manager.is_authenticated());
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test]
async fn test_disposed_listener_stops_receiving() {
    let manager = manager_with(Arc::new(MemoryTokenStore::new()), Arc::new(FakeAuthApi::new("pw")));
    let (log, sub) = recorder(&manager);

    manager.login("a@b.com", "pw").await.unwrap();
    sub.dispose();
    manager.logout().await.unwrap();
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test]
async fn test_invalidate_clears_once() {
    let store = Arc::new(MemoryTokenStore::new());
    let manager = manager_with(store.clone(), Arc::new(FakeAuthApi::new("pw")));
    manager.login("a@b.com", "pw").await.unwrap();
    let (log, _sub) = recorder(&manager);

    manager.invalidate("tok-0", "401 from /devices").await;
    manager.invalidate("tok-0", "401 from /devices").await;

    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(store.is_empty());
    let log = log.lock();
    assert_eq!(log.len(), 1);
    assert_eq!(
        log[0].reason,
        ChangeReason::Invalidated("401 from /devices".to_string())
    );
}

#[tokio::test]
async fn test_invalidate_ignores_rejection_of_old_token() {
    let store = Arc::new(MemoryTokenStore::new());
    let manager = manager_with(store.clone(), Arc::new(FakeAuthApi::new("pw")));
    manager.login("a@b.com", "pw").await.unwrap();
    manager.logout().await.unwrap();
    manager.login("a@b.com", "pw").await.unwrap();
    let (log, _sub) = recorder(&manager);

    manager.invalidate("tok-0", "401 from /devices").await;

    assert!(manager.is_authenticated());
    assert_eq!(manager.bearer_token().as_deref(), Some("tok-1"));
    assert_eq!(store.load().await.unwrap().token.as_deref(), Some("tok-1"));
    assert!(log.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_logout_clears_memory_before_the_store() {
    let store = Arc::new(SlowClearStore {
        inner: MemoryTokenStore::new(),
        delay: Duration::from_millis(200),
    });
    let manager = Arc::new(SessionManager::new(store.clone(), Arc::new(FakeAuthApi::new("pw"))));
    manager.login("a@b.com", "pw").await.unwrap();
    let (log, _sub) = recorder(&manager);

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.logout().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
    assert!(snapshot.user.is_none());
    assert!(!snapshot.has_token);
    assert_eq!(log.lock().len(), 1);
    assert_eq!(log.lock()[0].reason, ChangeReason::Logout);
    assert!(store.inner.load().await.unwrap().token.is_some());

    pending.await.unwrap().unwrap();
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn test_wait_server_logout_lets_notification_finish() {
    let api = Arc::new(FakeAuthApi::new("pw"));
    let manager = manager_with(Arc::new(MemoryTokenStore::new()), api.clone());
    assert!(manager.wait_server_logout(Duration::from_millis(10)).await);

    manager.login("a@b.com", "pw").await.unwrap();
    manager.logout().await.unwrap();
    assert!(manager.wait_server_logout(Duration::from_secs(1)).await);
    assert_eq!(api.logout_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_server_logout_is_bounded() {
    let api = Arc::new(FakeAuthApi::new("pw").hanging_logout());
    let manager = manager_with(Arc::new(MemoryTokenStore::new()), api);
    manager.login("a@b.com", "pw").await.unwrap();
    manager.logout().await.unwrap();

    assert!(!manager.wait_server_logout(Duration::from_millis(500)).await);
}

#[tokio::test]
async fn test_restore_discards_orphan_profile() {
    let store = Arc::new(MemoryTokenStore::new());
    store.save("tok", &UserProfile::new("u-1")).await.unwrap();
    store.clear().await.unwrap();
    store.save_user(&UserProfile::new("u-1")).await.unwrap();

    let manager = manager_with(store.clone(), Arc::new(FakeAuthApi::new("pw")));
    let snapshot = manager.restore().await;
    assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_restore_empty_store() {
    let manager = manager_with(Arc::new(MemoryTokenStore::new()), Arc::new(FakeAuthApi::new("pw")));
    let snapshot = manager.restore().await;
    assert_eq!(snapshot.status, SessionStatus::Unauthenticated);
    assert!(!snapshot.has_token);
}
