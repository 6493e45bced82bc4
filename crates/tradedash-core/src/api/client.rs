//! API client for the trading dashboard REST backend.
//!
//! `ApiClient` is cheap to clone: the reqwest client, the installed bearer
//! token and the interceptor chain are all shared between clones.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{AuthResponse, LoginCredentials, RefreshRequest, User};

use super::interceptor::{Intercepted, InterceptorChain, InterceptorId, ResponseInterceptor};
use super::{ApiError, AuthApi};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A logical request is re-dispatched at most this many times.
const MAX_REPLAYS: u32 = 1;

const LOGIN_PATH: &str = "/api/auth/login";
const REFRESH_PATH: &str = "/api/auth/refresh";
const PROFILE_PATH: &str = "/api/auth/profile";
const LOGOUT_PATH: &str = "/api/auth/logout";
const HEALTH_PATH: &str = "/health";
const EXCHANGE_STATUS_PATH: &str = "/api/status";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    interceptors: Arc<InterceptorChain>,
}

impl ApiClient {
    /// Create a new API client for the given backend base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            token: Arc::new(RwLock::new(None)),
            interceptors: Arc::new(InterceptorChain::new()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Currently installed bearer token, if any
    pub fn auth_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn register_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) -> InterceptorId {
        self.interceptors.register(interceptor)
    }

    pub fn eject_interceptor(&self, id: InterceptorId) -> bool {
        self.interceptors.eject(id)
    }

    /// Start a request against `path`, carrying the installed bearer token.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.auth_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    /// Dispatch without running interceptors. Used for the auth endpoints,
    /// whose failures the session controller handles itself.
    async fn send_raw(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        Self::check_response(response).await
    }

    /// Dispatch a request through the interceptor chain.
    ///
    /// An interceptor may ask for the request to be replayed; a logical request
    /// is replayed at most `MAX_REPLAYS` times.
    pub async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let mut request = builder.build()?;
        let mut replays = 0;

        loop {
            let template = request.try_clone();
            let method = request.method().clone();
            let url = request.url().to_string();
            debug!(%method, url = %url, replays, "Dispatching request");

            let response = self.client.execute(request).await?;

            let template = match template {
                Some(template) if !self.interceptors.is_empty() => template,
                Some(_) => return Self::check_response(response).await,
                None => {
                    debug!(url = %url, "Streaming body, skipping interceptors");
                    return Self::check_response(response).await;
                }
            };

            match self.interceptors.run(&template, response, replays).await? {
                Intercepted::Respond(response) => return Self::check_response(response).await,
                Intercepted::Replay(next) => {
                    if replays >= MAX_REPLAYS {
                        warn!(url = %url, replays, "Replay limit reached");
                        return Err(ApiError::InvalidResponse(
                            "Request replay limit reached".to_string(),
                        ));
                    }
                    replays += 1;
                    request = next;
                }
            }
        }
    }

    /// GET `path` through the interceptor chain and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.request(Method::GET, path)).await?;
        Self::parse_json(response, path).await
    }

    // ===== Page Data =====

    /// Backend health report (`/health`)
    pub async fn fetch_health(&self) -> Result<serde_json::Value, ApiError> {
        self.get_json(HEALTH_PATH).await
    }

    /// Exchange connection status (`/api/status`)
    pub async fn fetch_exchange_status(&self) -> Result<serde_json::Value, ApiError> {
        self.get_json(EXCHANGE_STATUS_PATH).await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        let builder = self.client.post(self.url(LOGIN_PATH)).json(credentials);
        let response = self.send_raw(builder).await?;
        Self::parse_json(response, "login response").await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        let builder = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest { refresh_token });
        let response = self.send_raw(builder).await?;
        Self::parse_json(response, "refresh response").await
    }

    async fn get_profile(&self) -> Result<User, ApiError> {
        let response = self.send_raw(self.request(Method::GET, PROFILE_PATH)).await?;
        Self::parse_json(response, "profile").await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.send_raw(self.request(Method::POST, LOGOUT_PATH)).await?;
        Ok(())
    }

    fn set_auth_token(&self, token: &str) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
    }

    fn clear_auth_token(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Overwrite the bearer token on a request about to be replayed.
pub(crate) fn with_bearer(mut request: reqwest::Request, token: &str) -> Result<reqwest::Request, ApiError> {
    let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ApiError::InvalidResponse(format!("Invalid access token: {}", e)))?;
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(request)
}

// ============================================================================
// Tests
// ============================================================================
