use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// The session was cleared while this operation was in flight; its result was discarded.
    #[error("Session ended while the request was in flight")]
    SessionEnded,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// Message suitable for a notice: the server's own wording when it sent
    /// one, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AuthError::Api(e) => e.detail().unwrap_or(fallback).to_string(),
            _ => fallback.to_string(),
        }
    }
}
