//! Tradedash Core Library
//!
//! Shared client-side logic for the tradedash trading dashboard:
//!
//! - `api`: HTTP client for the dashboard backend, with response interceptors
//! - `auth`: session controller, token storage, refresh-on-401, scheduled refresh
//! - `routes`: route table, session gate and navigation history
//! - `query`: session-scoped cache of fetched page data
//! - `theme`: design-system color tokens and animations
//! - `config`: application configuration
//! - `notice`: toast-style messages emitted by the session controller
//! - `models`: request/response types

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notice;
pub mod query;
pub mod routes;
pub mod theme;

pub use api::{ApiClient, ApiError, AuthApi};
pub use auth::{AuthError, Session, SessionController};
pub use config::Config;
pub use notice::{Notice, NoticeLevel};
pub use routes::{Gate, GateDecision, Navigator, Route};
