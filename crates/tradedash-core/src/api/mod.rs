//! REST API client module for the trading dashboard backend.
//!
//! This module provides the `ApiClient` used for every backend call, the
//! `AuthApi` contract the session controller depends on, and the response
//! interceptor chain that wraps data requests.
//!
//! Authentication uses JWT bearer tokens obtained from `/api/auth/login`
//! and renewed through `/api/auth/refresh`.

pub mod client;
pub mod contract;
pub mod error;
pub mod interceptor;

pub use client::ApiClient;
pub use contract::AuthApi;
pub use error::{ApiError, ServerMessage};
pub use interceptor::{Intercepted, InterceptorChain, InterceptorId, ResponseInterceptor};
