//! Data models exchanged with the trading dashboard backend.
//!
//! - `LoginCredentials`, `AuthResponse`: login and refresh payloads
//! - `User`: the opaque profile record returned by the profile endpoint

pub mod auth;
pub mod user;

pub use auth::{AuthResponse, LoginCredentials, RefreshRequest};
pub use user::User;
