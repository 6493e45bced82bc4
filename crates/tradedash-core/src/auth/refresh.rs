//! Background token refresh while the session is authenticated.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::SessionController;

/// Handle to the refresh task. The task is aborted when this is dropped.
pub struct RefreshScheduler {
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Spawn the refresh loop on the current tokio runtime.
    ///
    /// The timer only runs while the session is authenticated and is dropped
    /// the moment the session ends. Failed refreshes are logged and otherwise
    /// ignored; the next rejected request clears the session.
    pub fn spawn(controller: &Arc<SessionController>, every: Duration) -> Self {
        let weak = Arc::downgrade(controller);
        let mut session = controller.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                // Wait for a session to exist
                while !session.borrow_and_update().is_authenticated {
                    if session.changed().await.is_err() {
                        return;
                    }
                }

                debug!(every_secs = every.as_secs(), "Scheduling token refresh");
                let mut ticker = interval_at(Instant::now() + every, every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let Some(controller) = weak.upgrade() else {
                                return;
                            };
                            if let Err(e) = controller.refresh_token().await {
                                debug!(error = %e, "Scheduled token refresh failed");
                            }
                        }
                        changed = session.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            if !session.borrow_and_update().is_authenticated {
                                debug!("Session ended, cancelling scheduled refresh");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::FakeApi;
    use crate::auth::{MemoryTokenStore, TokenPair};
    use crate::models::LoginCredentials;
    use std::sync::atomic::Ordering;

    const EVERY: Duration = Duration::from_secs(25 * 60);

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_on_interval_while_authenticated() {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
        let controller = Arc::new(SessionController::new(api.clone(), store));
        controller.initialize().await;

        let scheduler = RefreshScheduler::spawn(&controller, EVERY);
        settle().await;

        tokio::time::sleep(EVERY - Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(api.refreshes(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(api.refreshes(), 1);

        tokio::time::sleep(EVERY).await;
        settle().await;
        assert_eq!(api.refreshes(), 2);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_logout_and_resumes_on_login() {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
        let controller = Arc::new(SessionController::new(api.clone(), store));
        controller.initialize().await;

        let _scheduler = RefreshScheduler::spawn(&controller, EVERY);
        settle().await;

        controller.logout().await;
        settle().await;

        tokio::time::sleep(EVERY * 3).await;
        settle().await;
        assert_eq!(api.refreshes(), 0);

        controller
            .login(&LoginCredentials::new("alice", "pw"))
            .await
            .unwrap();
        settle().await;

        tokio::time::sleep(EVERY + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(api.refreshes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_is_silent_and_ends_timer() {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
        let controller = Arc::new(SessionController::new(api.clone(), store));
        controller.initialize().await;
        api.refresh_ok.store(false, Ordering::SeqCst);

        let scheduler = RefreshScheduler::spawn(&controller, EVERY);
        settle().await;

        tokio::time::sleep(EVERY + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(api.refreshes(), 1);
        assert!(!controller.session().is_authenticated);

        // No further attempts once the session is gone
        tokio::time::sleep(EVERY * 2).await;
        settle().await;
        assert_eq!(api.refreshes(), 1);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_timer() {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
        let controller = Arc::new(SessionController::new(api.clone(), store));
        controller.initialize().await;

        let scheduler = RefreshScheduler::spawn(&controller, EVERY);
        settle().await;
        scheduler.stop();

        tokio::time::sleep(EVERY * 2).await;
        settle().await;
        assert_eq!(api.refreshes(), 0);
    }
}
