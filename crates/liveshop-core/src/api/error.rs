use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::auth::CredentialError;
use crate::models::response::{ApiResponse, GENERIC_ERROR_MESSAGE};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Network error. Please check your connection. ({0})")]
    Network(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Session expired - please sign in again")]
    AuthExpired,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential storage error: {0}")]
    Credentials(#[from] CredentialError),
}

/// Maximum length for error response bodies in log output
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build a server error from a non-success response.
    ///
    /// The envelope's `message` (or `error`) is passed through verbatim;
    /// anything else gets the generic fallback.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if !body.is_empty() {
            debug!(status = %status, body = %Self::truncate_body(body), "Error response body");
        }
        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
            .ok()
            .and_then(|resp| resp.reason().map(str::to_string))
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
        ApiError::Server {
            status: status.as_u16(),
            message,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired)
    }

    /// HTTP status when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::Validation(err.to_string())
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else if err.is_timeout() {
            ApiError::Network("request timed out".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_passes_message_through() {
        let body = r#"{"success":false,"message":"Invalid email or password"}"#;
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_from_status_generic_fallback() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.to_string(), GENERIC_ERROR_MESSAGE);

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.to_string(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("510 total bytes"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        // 'é' is two bytes, so byte 500 lands mid-character
        let long = format!("a{}", "é".repeat(300));
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_is_auth_expired() {
        assert!(ApiError::AuthExpired.is_auth_expired());
        assert!(!ApiError::Network("down".into()).is_auth_expired());
    }
}
