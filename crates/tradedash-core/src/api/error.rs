use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Message reported by the server alongside a failed status.
///
/// The backend answers errors with `{"detail": "..."}`; when that shape is
/// present `detail` holds the string, otherwise only the (truncated) body is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessage {
    pub detail: Option<String>,
    pub body: String,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail {
            Some(ref detail) => f.write_str(detail),
            None => f.write_str(&self.body),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(ServerMessage),

    #[error("Unauthorized - token may be expired")]
    Unauthorized(ServerMessage),

    #[error("Resource not found: {0}")]
    NotFound(ServerMessage),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: ServerMessage },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(ServerMessage),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request body cannot be replayed")]
    NotReplayable,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the `detail` field out of a JSON error body.
    /// Validation errors carry a list of objects; their first `msg` is used.
    fn parse_detail(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Array(items) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(|msg| msg.as_str())
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = ServerMessage {
            detail: Self::parse_detail(body),
            body: Self::truncate_body(body),
        };
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            code => ApiError::Rejected { status: code, message },
        }
    }

    /// The server-provided error message, if the response carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::AccessDenied(m)
            | ApiError::Unauthorized(m)
            | ApiError::NotFound(m)
            | ApiError::ServerError(m)
            | ApiError::Rejected { message: m, .. } => m.detail.as_deref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_extracts_detail() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"detail":"Invalid username or password"}"#,
        );
        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), Some("Invalid username or password"));
    }

    #[test]
    fn test_from_status_validation_detail_list() {
        let body = r#"{"detail":[{"loc":["body","username"],"msg":"field required","type":"value_error.missing"}]}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert!(matches!(err, ApiError::Rejected { status: 422, .. }));
        assert_eq!(err.detail(), Some("field required"));
    }

    #[test]
    fn test_from_status_plain_body_has_no_detail() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, ApiError::ServerError(_)));
        assert_eq!(err.detail(), None);
        assert_eq!(err.to_string(), "Server error: upstream down");
    }

    #[test]
    fn test_rate_limited_and_not_found() {
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "{}"),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 510 total bytes"));
    }
}
