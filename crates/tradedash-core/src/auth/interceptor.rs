use std::sync::Weak;

use async_trait::async_trait;
use reqwest::{Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::api::client::with_bearer;
use crate::api::{ApiError, Intercepted, ResponseInterceptor};

use super::SessionController;

/// Refreshes the session on a 401 and replays the request once with the new
/// access token. A second 401, or a failed refresh, clears the session and
/// hands the original response back to the caller.
pub struct RefreshOnUnauthorized {
    controller: Weak<SessionController>,
}

impl RefreshOnUnauthorized {
    pub fn new(controller: Weak<SessionController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl ResponseInterceptor for RefreshOnUnauthorized {
    async fn on_response(
        &self,
        request: &Request,
        response: Response,
        replays: u32,
    ) -> Result<Intercepted, ApiError> {
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(Intercepted::Respond(response));
        }
        let Some(controller) = self.controller.upgrade() else {
            return Ok(Intercepted::Respond(response));
        };

        if replays > 0 {
            warn!(url = %request.url(), "Still unauthorized after token refresh, clearing session");
            controller.clear_tokens();
            return Ok(Intercepted::Respond(response));
        }

        debug!(url = %request.url(), "Unauthorized, refreshing token");
        if let Err(e) = controller.refresh_token().await {
            warn!(error = %e, "Token refresh failed, clearing session");
            controller.clear_tokens();
            return Ok(Intercepted::Respond(response));
        }

        let Some(token) = controller.access_token() else {
            return Ok(Intercepted::Respond(response));
        };
        let replay = request.try_clone().ok_or(ApiError::NotReplayable)?;
        Ok(Intercepted::Replay(with_bearer(replay, &token)?))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::{ApiClient, ApiError, AuthApi};
    use crate::auth::testing::FakeApi;
    use crate::auth::{MemoryTokenStore, SessionController, TokenPair, TokenStore};

    /// Controller driven by a scripted auth API, interceptor attached to a
    /// real client pointed at a mock data server.
    async fn setup(
        server: &MockServer,
    ) -> (Arc<FakeApi>, Arc<MemoryTokenStore>, Arc<SessionController>, ApiClient) {
        let api = Arc::new(FakeApi::default());
        let store = Arc::new(MemoryTokenStore::with_pair(TokenPair::new("a1", "r1")));
        let controller = Arc::new(SessionController::new(api.clone(), store.clone()));
        controller.initialize().await;

        let client = ApiClient::new(server.uri()).unwrap();
        client.set_auth_token("a1");
        (api, store, controller, client)
    }

    #[tokio::test]
    async fn test_single_401_retried_with_refreshed_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/positions"))
            .and(header("authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/positions"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"symbol": "BTCUSDT"}])))
            .expect(1)
            .mount(&server)
            .await;

        let (api, store, controller, client) = setup(&server).await;
        let _attached = controller.attach(&client);

        let positions: serde_json::Value = client.get_json("/api/positions").await.unwrap();
        assert_eq!(positions[0]["symbol"], "BTCUSDT");
        assert_eq!(api.refreshes(), 1);
        assert_eq!(store.access_token().unwrap().as_deref(), Some("access-1"));
        assert!(controller.session().is_authenticated);
    }

    #[tokio::test]
    async fn test_second_401_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let (api, store, controller, client) = setup(&server).await;
        let _attached = controller.attach(&client);

        let err = client
            .get_json::<serde_json::Value>("/api/orders")
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(api.refreshes(), 1);
        assert!(store.load().unwrap().is_none());
        assert!(!controller.session().is_authenticated);
    }

    #[tokio::test]
    async fn test_failed_refresh_propagates_original_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/trades"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
            .expect(1)
            .mount(&server)
            .await;

        let (api, store, controller, client) = setup(&server).await;
        api.refresh_ok.store(false, Ordering::SeqCst);
        let _attached = controller.attach(&client);

        let err = client
            .get_json::<serde_json::Value>("/api/trades")
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), Some("expired"));
        assert!(store.load().unwrap().is_none());
        assert!(!controller.session().is_authenticated);
    }

    #[tokio::test]
    async fn test_other_failures_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/balance"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "exchange down"})))
            .expect(1)
            .mount(&server)
            .await;

        let (api, store, controller, client) = setup(&server).await;
        let _attached = controller.attach(&client);

        let err = client
            .get_json::<serde_json::Value>("/api/balance")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ServerError(_)));
        assert_eq!(api.refreshes(), 0);
        assert!(store.load().unwrap().is_some());
        assert!(controller.session().is_authenticated);
    }

    #[tokio::test]
    async fn test_detached_interceptor_stops_refreshing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/account"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (api, _store, controller, client) = setup(&server).await;
        drop(controller.attach(&client));

        let err = client
            .get_json::<serde_json::Value>("/api/account")
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(api.refreshes(), 0);
        assert!(controller.session().is_authenticated);
    }
}
