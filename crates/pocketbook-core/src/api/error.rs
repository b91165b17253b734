use thiserror::Error;

use crate::auth::StorageError;
use crate::models::ErrorBody;

/// Failures of the token-refresh flow. Every variant means the session could
/// not be recovered and the user has to log in again.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No refresh token stored - please log in again")]
    NoRefreshToken,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] Box<ApiError>),

    #[error("Token refresh returned an unexpected payload: {0}")]
    MalformedRefreshResponse(String),

    #[error("Stored token contains invalid header characters - please log in again")]
    InvalidToken,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", head, body.len())
        }
    }

    /// Map a failed response to an error, taking the text from the
    /// `message`/`error_details` envelope when the body carries one.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let text = match ErrorBody::parse(body) {
            Some(err) => err.text().map(str::to_string).unwrap_or_default(),
            None => Self::truncate_body(body),
        };
        match status.as_u16() {
            401 => ApiError::Unauthorized(text),
            403 => ApiError::AccessDenied(text),
            404 => ApiError::NotFound(text),
            400 | 422 => ApiError::Validation(text),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(text),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, text)),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// True when the session is gone and the caller should send the user to login
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_uses_envelope_message() {
        let body = r#"{"data": {"message": "Budget limit must be positive"}}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Budget limit must be positive"));
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "nope"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, ""),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "<html>"),
            ApiError::ServerError(ref m) if m == "<html>"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "é".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated"));
        assert!(truncated.starts_with(&"é".repeat(MAX_ERROR_BODY_LENGTH)));
    }

    #[test]
    fn test_requires_login() {
        assert!(ApiError::Auth(AuthError::NoRefreshToken).requires_login());
        assert!(!ApiError::Unauthorized(String::new()).requires_login());
        assert!(!ApiError::RateLimited.requires_login());
    }
}
