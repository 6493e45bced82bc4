//! Scripted `AuthApi` used by the session tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::{ApiError, AuthApi, ServerMessage};
use crate::models::{AuthResponse, LoginCredentials, User};

pub(crate) fn unauthorized(detail: &str) -> ApiError {
    ApiError::Unauthorized(ServerMessage {
        detail: Some(detail.to_string()),
        body: format!(r#"{{"detail":"{}"}}"#, detail),
    })
}

pub(crate) fn profile_x() -> User {
    serde_json::from_value(serde_json::json!({"id": 1, "name": "X"})).unwrap()
}

pub(crate) struct FakeApi {
    pub login_ok: AtomicBool,
    pub refresh_ok: AtomicBool,
    pub profile_ok: AtomicBool,
    pub logout_ok: AtomicBool,
    /// When set, the profile only succeeds with this bearer token installed
    pub accepted_token: Mutex<Option<String>>,
    /// When set, refresh waits for a notification before answering
    pub refresh_gate: Mutex<Option<Arc<Notify>>>,
    pub login_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub profile_calls: AtomicU32,
    pub logout_calls: AtomicU32,
    pub token: Mutex<Option<String>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            login_ok: AtomicBool::new(true),
            refresh_ok: AtomicBool::new(true),
            profile_ok: AtomicBool::new(true),
            logout_ok: AtomicBool::new(true),
            accepted_token: Mutex::new(None),
            refresh_gate: Mutex::new(None),
            login_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            profile_calls: AtomicU32::new(0),
            logout_calls: AtomicU32::new(0),
            token: Mutex::new(None),
        }
    }
}

impl FakeApi {
    pub fn refreshes(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn installed_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn login(&self, _credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if !self.login_ok.load(Ordering::SeqCst) {
            return Err(unauthorized("Invalid username or password"));
        }
        Ok(AuthResponse {
            access_token: "login-access".to_string(),
            refresh_token: "login-refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_in: Some(1800),
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if !self.refresh_ok.load(Ordering::SeqCst) {
            return Err(unauthorized("Invalid or expired refresh token"));
        }
        Ok(AuthResponse {
            access_token: format!("access-{}", n),
            refresh_token: format!("{}-next", refresh_token),
            token_type: "bearer".to_string(),
            expires_in: Some(1800),
        })
    }

    async fn get_profile(&self) -> Result<User, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if !self.profile_ok.load(Ordering::SeqCst) {
            return Err(unauthorized("Invalid or expired token"));
        }
        let accepted = self.accepted_token.lock().unwrap().clone();
        if let Some(accepted) = accepted {
            if self.installed_token().as_deref() != Some(accepted.as_str()) {
                return Err(unauthorized("Invalid or expired token"));
            }
        }
        Ok(profile_x())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::InvalidResponse("connection reset".to_string()))
        }
    }

    fn set_auth_token(&self, token: &str) {
        *self.token.lock().unwrap() = Some(token.to_string());
    }

    fn clear_auth_token(&self) {
        *self.token.lock().unwrap() = None;
    }
}
