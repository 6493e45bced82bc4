use async_trait::async_trait;

use crate::models::{AuthResponse, LoginCredentials, User};

use super::ApiError;

/// Backend operations the session controller relies on.
///
/// `ApiClient` is the production implementation; tests substitute scripted fakes.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthResponse, ApiError>;

    async fn get_profile(&self) -> Result<User, ApiError>;

    /// Best-effort server-side logout
    async fn logout(&self) -> Result<(), ApiError>;

    /// Install the bearer token used by subsequent requests
    fn set_auth_token(&self, token: &str);

    fn clear_auth_token(&self);
}
