//! Authentication and session management.
//!
//! This module provides:
//! - `SessionController`: owns the session state and the token pair
//! - `RefreshOnUnauthorized`: retries a rejected request once after a token refresh
//! - `RefreshScheduler`: refreshes tokens on a timer while signed in
//! - `TokenStore`: persistence for the token pair (file, keyring, memory)
//!
//! Access tokens expire after 30 minutes; the refresh token is exchanged for
//! a new pair before that happens.

pub mod controller;
pub mod credentials;
pub mod error;
pub mod interceptor;
pub mod refresh;
pub mod session;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{AttachedInterceptor, SessionController};
pub use credentials::KeyringTokenStore;
pub use error::AuthError;
pub use interceptor::RefreshOnUnauthorized;
pub use refresh::RefreshScheduler;
pub use session::Session;
pub use tokens::{
    FileTokenStore, MemoryTokenStore, TokenPair, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
