//! Session controller: the single owner of session state and the token pair.
//!
//! Consumers (route gate, interceptor, refresh scheduler, front end) hold an
//! `Arc<SessionController>` and observe state through `subscribe()`.
//!
//! Token writes and clears happen inside one short critical section that also
//! tracks a session epoch. Clearing bumps the epoch, and any login or refresh
//! whose result lands after a clear is discarded. Refreshes are single-flight:
//! a caller that waited on an in-progress refresh reuses its outcome.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, AuthApi, InterceptorId};
use crate::models::{LoginCredentials, User};
use crate::notice::Notice;
use crate::query::QueryCache;

use super::interceptor::RefreshOnUnauthorized;
use super::tokens::{TokenPair, TokenStore};
use super::{AuthError, Session};

/// Buffer size for the notice channel.
const NOTICE_CHANNEL_SIZE: usize = 16;

const LOGIN_SUCCESS: &str = "Login successful!";
const LOGIN_FAILED: &str = "Login failed";
const LOGOUT_SUCCESS: &str = "Logged out successfully";

#[derive(Debug, Default)]
struct Ledger {
    /// Bumped on every clear
    epoch: u64,
    /// Bumped on every token write or clear
    revision: u64,
}

#[derive(Debug, Default)]
struct Activity {
    initialized: bool,
    pending: u32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct SessionController {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    queries: Arc<QueryCache>,
    state: watch::Sender<Session>,
    notices: broadcast::Sender<Notice>,
    ledger: Mutex<Ledger>,
    activity: Mutex<Activity>,
    refresh_flight: tokio::sync::Mutex<()>,
}

/// Marks an operation in flight for `is_loading`; released on drop, so error
/// paths and early returns are covered.
struct Busy<'a> {
    controller: &'a SessionController,
    completes_init: bool,
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let mut activity = lock(&self.controller.activity);
        activity.pending = activity.pending.saturating_sub(1);
        if self.completes_init {
            activity.initialized = true;
        }
        self.controller.publish_loading(&activity);
    }
}

/// Keeps the refresh-on-401 interceptor registered; ejects it on drop.
pub struct AttachedInterceptor {
    client: ApiClient,
    id: InterceptorId,
}

impl Drop for AttachedInterceptor {
    fn drop(&mut self) {
        self.client.eject_interceptor(self.id);
    }
}

impl SessionController {
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(Session::default());
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        Self {
            api,
            store,
            queries: Arc::new(QueryCache::new()),
            state,
            notices,
            ledger: Mutex::new(Ledger::default()),
            activity: Mutex::new(Activity::default()),
            refresh_flight: tokio::sync::Mutex::new(()),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Session generation. Bumped every time the session is cleared, so work
    /// started under one sign-in can tell it no longer belongs to the current one.
    pub fn epoch(&self) -> u64 {
        lock(&self.ledger).epoch
    }

    pub fn query_cache(&self) -> &Arc<QueryCache> {
        &self.queries
    }

    /// Access token currently in storage
    pub fn access_token(&self) -> Option<String> {
        match self.store.access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                None
            }
        }
    }

    /// Register the refresh-on-401 interceptor on `client`.
    pub fn attach(self: &Arc<Self>, client: &ApiClient) -> AttachedInterceptor {
        let interceptor = RefreshOnUnauthorized::new(Arc::downgrade(self));
        let id = client.register_interceptor(Arc::new(interceptor));
        AttachedInterceptor {
            client: client.clone(),
            id,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Restore the session from stored tokens. Run once at startup.
    ///
    /// `is_loading` drops to false when this returns, whatever the outcome.
    pub async fn initialize(&self) {
        let _busy = self.busy(true);
        let epoch = self.epoch();

        let pair = match self.store.load() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Failed to read stored tokens");
                None
            }
        };
        let Some(pair) = pair else {
            debug!("No stored tokens, starting signed out");
            return;
        };

        self.api.set_auth_token(&pair.access_token);
        match self.api.get_profile().await {
            Ok(user) => match self.set_user(epoch, user) {
                Ok(()) => info!("Session restored from stored tokens"),
                Err(e) => debug!(error = %e, "Discarding restored profile"),
            },
            Err(e) => {
                debug!(error = %e, "Profile fetch failed, attempting token refresh");
                if let Err(e) = self.refresh_token().await {
                    warn!(error = %e, "Could not restore session");
                    self.clear_tokens_if(epoch);
                }
            }
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(), AuthError> {
        let _busy = self.busy(false);
        let epoch = self.epoch();

        let result = self.try_login(credentials, epoch).await;
        match result {
            Ok(()) => {
                info!(username = %credentials.username, "Login successful");
                self.notify(Notice::success(LOGIN_SUCCESS));
            }
            Err(ref e) => {
                warn!(username = %credentials.username, error = %e, "Login failed");
                self.notify(Notice::error(e.user_message(LOGIN_FAILED)));
            }
        }
        result
    }

    async fn try_login(&self, credentials: &LoginCredentials, epoch: u64) -> Result<(), AuthError> {
        let response = self.api.login(credentials).await?;
        self.persist(epoch, &response.token_pair())?;
        if let Err(e) = self.populate_profile(epoch).await {
            self.clear_tokens_if(epoch);
            return Err(e);
        }
        Ok(())
    }

    /// Log out locally no matter what the server says.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            // Best effort: the local session is cleared regardless
            warn!(error = %e, "Server logout failed, clearing session locally");
        }
        self.clear_tokens();
        info!("Logged out");
        self.notify(Notice::success(LOGOUT_SUCCESS));
    }

    /// Exchange the stored refresh token for a new pair and re-populate the profile.
    ///
    /// Fails with `MissingRefreshToken`, without touching the network, when no
    /// refresh token is stored. Any other failure clears the session.
    pub async fn refresh_token(&self) -> Result<(), AuthError> {
        let seen_revision = self.revision();
        let _flight = self.refresh_flight.lock().await;

        if self.revision() != seen_revision {
            // A refresh, login or clear landed while we waited
            return match self.store.load()? {
                Some(_) => {
                    debug!("Reusing concurrent token refresh");
                    Ok(())
                }
                None => Err(AuthError::SessionEnded),
            };
        }

        let Some(refresh_token) = self.store.refresh_token()? else {
            return Err(AuthError::MissingRefreshToken);
        };

        let _busy = self.busy(false);
        let epoch = self.epoch();

        let result: Result<(), AuthError> = async {
            let response = self.api.refresh_token(&refresh_token).await?;
            self.persist(epoch, &response.token_pair())?;
            self.populate_profile(epoch).await
        }
        .await;

        match result {
            Ok(()) => debug!("Token refreshed"),
            Err(ref e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.clear_tokens_if(epoch);
            }
        }
        result
    }

    /// Remove both tokens, reset the session and drop cached queries.
    pub(crate) fn clear_tokens(&self) {
        let mut ledger = lock(&self.ledger);
        self.clear_locked(&mut ledger);
    }

    /// Clear only if no other clear happened since `epoch`
    fn clear_tokens_if(&self, epoch: u64) {
        let mut ledger = lock(&self.ledger);
        if ledger.epoch == epoch {
            self.clear_locked(&mut ledger);
        }
    }

    fn clear_locked(&self, ledger: &mut Ledger) {
        ledger.epoch += 1;
        ledger.revision += 1;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        self.api.clear_auth_token();
        self.state.send_modify(|session| {
            session.user = None;
            session.is_authenticated = false;
        });
        self.queries.clear();
        debug!(epoch = ledger.epoch, "Session cleared");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn revision(&self) -> u64 {
        lock(&self.ledger).revision
    }

    fn persist(&self, epoch: u64, pair: &TokenPair) -> Result<(), AuthError> {
        let mut ledger = lock(&self.ledger);
        if ledger.epoch != epoch {
            return Err(AuthError::SessionEnded);
        }
        // Synchronous store I/O under the ledger lock: a clear must not land
        // between the epoch check and the write.
        self.store.save(pair)?;
        self.api.set_auth_token(&pair.access_token);
        ledger.revision += 1;
        Ok(())
    }

    async fn populate_profile(&self, epoch: u64) -> Result<(), AuthError> {
        let user = self.api.get_profile().await?;
        self.set_user(epoch, user)
    }

    fn set_user(&self, epoch: u64, user: User) -> Result<(), AuthError> {
        let ledger = lock(&self.ledger);
        if ledger.epoch != epoch {
            return Err(AuthError::SessionEnded);
        }
        self.state.send_modify(|session| {
            session.user = Some(user);
            session.is_authenticated = true;
        });
        Ok(())
    }

    fn busy(&self, completes_init: bool) -> Busy<'_> {
        let mut activity = lock(&self.activity);
        activity.pending += 1;
        self.publish_loading(&activity);
        Busy {
            controller: self,
            completes_init,
        }
    }

    fn publish_loading(&self, activity: &Activity) {
        let loading = !activity.initialized || activity.pending > 0;
        self.state.send_if_modified(|session| {
            if session.is_loading == loading {
                false
            } else {
                session.is_loading = loading;
                true
            }
        });
    }

    fn notify(&self, notice: Notice) {
        // No subscriber just means nobody is showing notices
        let _ = self.notices.send(notice);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{profile_x, FakeApi};
    use crate::auth::MemoryTokenStore;
    use crate::notice::NoticeLevel;
    use std::sync::atomic::Ordering;
    use tokio::sync::Notify;

    fn controller_with(api: &Arc<FakeApi>, store: &Arc<MemoryTokenStore>) -> Arc<SessionController> {
        Arc::new(SessionController::new(api.clone(), store.clone()))
    }

    fn stored(access: &str, refresh: &str) -> Arc<MemoryTokenStore> {
        Arc::new(MemoryTokenStore::with_pair(TokenPair::new(access, refresh)))
    }

    // -------------------------------------------------------------------------
    // Initialize
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_initial_session_is_loading() {
        let api = Arc::new(FakeApi::default());
        let controller = controller_with(&api, &Arc::new(MemoryTokenStore::new()));
        assert_eq!(controller.session(), Session::default());
        assert!(controller.session().is_loading);
    }

    #[tokio::test]
    async fn test_initialize_restores_session_without_refresh() {
        let api = Arc::new(FakeApi::default());
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);

        controller.initialize().await;

        assert_eq!(
            controller.session(),
            Session {
                user: Some(profile_x()),
                is_authenticated: true,
                is_loading: false,
            }
        );
        assert_eq!(api.refreshes(), 0);
        assert_eq!(api.installed_token().as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn test_initialize_without_tokens_makes_no_calls() {
        let api = Arc::new(FakeApi::default());
        let controller = controller_with(&api, &Arc::new(MemoryTokenStore::new()));

        controller.initialize().await;

        let session = controller.session();
        assert!(!session.is_authenticated);
        assert!(!session.is_loading);
        assert_eq!(api.profile_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.refreshes(), 0);
    }

    #[tokio::test]
    async fn test_initialize_refreshes_once_when_profile_fails() {
        let api = Arc::new(FakeApi::default());
        // The stored access token is expired; only the refreshed one works
        *api.accepted_token.lock().unwrap() = Some("access-1".to_string());
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);

        controller.initialize().await;

        let session = controller.session();
        assert!(session.is_authenticated);
        assert!(!session.is_loading);
        assert_eq!(api.refreshes(), 1);
        assert_eq!(store.load().unwrap(), Some(TokenPair::new("access-1", "r1-next")));
    }

    #[tokio::test]
    async fn test_initialize_clears_when_profile_and_refresh_fail() {
        let api = Arc::new(FakeApi::default());
        api.profile_ok.store(false, Ordering::SeqCst);
        api.refresh_ok.store(false, Ordering::SeqCst);
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);

        controller.initialize().await;

        let session = controller.session();
        assert!(!session.is_authenticated);
        assert!(session.user.is_none());
        assert!(!session.is_loading);
        assert!(store.load().unwrap().is_none());
        assert_eq!(api.installed_token(), None);
    }

    // -------------------------------------------------------------------------
    // Login / Logout
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_login_persists_tokens_and_notifies() {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryTokenStore::new());
        let controller = controller_with(&api, &store);
        controller.initialize().await;
        let mut notices = controller.subscribe_notices();

        controller
            .login(&LoginCredentials::new("alice", "pw"))
            .await
            .unwrap();

        assert_eq!(
            store.load().unwrap(),
            Some(TokenPair::new("login-access", "login-refresh"))
        );
        assert_eq!(api.installed_token().as_deref(), Some("login-access"));
        assert!(controller.session().is_authenticated);
        assert!(!controller.session().is_loading);

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice, Notice::success("Login successful!"));
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_server_message() {
        let api = Arc::new(FakeApi::default());
        api.login_ok.store(false, Ordering::SeqCst);
        let store = Arc::new(MemoryTokenStore::new());
        let controller = controller_with(&api, &store);
        controller.initialize().await;
        let mut notices = controller.subscribe_notices();

        let err = controller
            .login(&LoginCredentials::new("alice", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Api(_)));
        assert!(!controller.session().is_authenticated);
        assert!(store.load().unwrap().is_none());

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Invalid username or password");
    }

    #[test]
    fn test_user_message_falls_back() {
        let err = AuthError::MissingRefreshToken;
        assert_eq!(err.user_message("Login failed"), "Login failed");
        let err = AuthError::Api(crate::api::ApiError::RateLimited);
        assert_eq!(err.user_message("Login failed"), "Login failed");
    }

    #[tokio::test]
    async fn test_login_then_logout_clears_everything() {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryTokenStore::new());
        let controller = controller_with(&api, &store);
        controller.initialize().await;

        for _ in 0..3 {
            controller
                .login(&LoginCredentials::new("alice", "pw"))
                .await
                .unwrap();
            controller.query_cache().put("health", &1).unwrap();
            controller.logout().await;

            let session = controller.session();
            assert!(!session.is_authenticated);
            assert!(session.user.is_none());
            assert!(store.load().unwrap().is_none());
            assert!(controller.query_cache().is_empty());
        }
    }

    #[tokio::test]
    async fn test_epoch_advances_on_each_clear() {
        let api = Arc::new(FakeApi::default());
        let controller = controller_with(&api, &stored("a1", "r1"));
        controller.initialize().await;
        let start = controller.epoch();

        controller.login(&LoginCredentials::new("alice", "pw")).await.unwrap();
        assert_eq!(controller.epoch(), start);

        controller.logout().await;
        assert_eq!(controller.epoch(), start + 1);
        controller.login(&LoginCredentials::new("bob", "pw")).await.unwrap();
        controller.logout().await;
        assert_eq!(controller.epoch(), start + 2);
    }

    #[tokio::test]
    async fn test_logout_swallows_server_failure() {
        let api = Arc::new(FakeApi::default());
        api.logout_ok.store(false, Ordering::SeqCst);
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);
        controller.initialize().await;
        let mut notices = controller.subscribe_notices();

        controller.logout().await;

        assert_eq!(api.logout_calls.load(Ordering::SeqCst), 1);
        assert!(store.load().unwrap().is_none());
        assert!(!controller.session().is_authenticated);
        assert_eq!(
            notices.recv().await.unwrap(),
            Notice::success("Logged out successfully")
        );
    }

    // -------------------------------------------------------------------------
    // RefreshToken
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_refresh_without_token_fails_without_network() {
        let api = Arc::new(FakeApi::default());
        let controller = controller_with(&api, &Arc::new(MemoryTokenStore::new()));
        controller.initialize().await;

        let err = controller.refresh_token().await.unwrap_err();
        assert!(matches!(err, AuthError::MissingRefreshToken));
        assert_eq!(api.refreshes(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let api = Arc::new(FakeApi::default());
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);
        controller.initialize().await;
        assert!(controller.session().is_authenticated);

        api.refresh_ok.store(false, Ordering::SeqCst);
        assert!(controller.refresh_token().await.is_err());

        assert!(!controller.session().is_authenticated);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_request() {
        let api = Arc::new(FakeApi::default());
        let gate = Arc::new(Notify::new());
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);
        controller.initialize().await;
        *api.refresh_gate.lock().unwrap() = Some(gate.clone());

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh_token().await }
        });
        let second = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh_token().await }
        });

        // Let both tasks reach the refresh before releasing it
        while api.refreshes() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(api.refreshes(), 1);
        assert_eq!(store.load().unwrap(), Some(TokenPair::new("access-1", "r1-next")));
    }

    #[tokio::test]
    async fn test_refresh_landing_after_logout_is_discarded() {
        let api = Arc::new(FakeApi::default());
        let gate = Arc::new(Notify::new());
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);
        controller.initialize().await;
        *api.refresh_gate.lock().unwrap() = Some(gate.clone());

        let refresh = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh_token().await }
        });
        while api.refreshes() == 0 {
            tokio::task::yield_now().await;
        }

        controller.logout().await;
        gate.notify_one();

        let err = refresh.await.unwrap().unwrap_err();
        assert!(matches!(err, AuthError::SessionEnded));
        assert!(!controller.session().is_authenticated);
        assert!(store.load().unwrap().is_none());
        assert_eq!(api.installed_token(), None);
    }

    #[tokio::test]
    async fn test_is_loading_tracks_refresh_in_flight() {
        let api = Arc::new(FakeApi::default());
        let gate = Arc::new(Notify::new());
        let store = stored("a1", "r1");
        let controller = controller_with(&api, &store);
        controller.initialize().await;
        assert!(!controller.session().is_loading);
        *api.refresh_gate.lock().unwrap() = Some(gate.clone());

        let refresh = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh_token().await }
        });
        while api.refreshes() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(controller.session().is_loading);

        gate.notify_one();
        refresh.await.unwrap().unwrap();
        assert!(!controller.session().is_loading);
    }
}
