use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::TokenPair;

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Token response returned by both login and refresh.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthResponse {
    pub fn token_pair(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}
