// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::signing::SigningError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    MissingParameter(&'static str),

    // 403 Forbidden
    Forbidden(String),

    // 410 Gone
    LinkExpired { expired_at: DateTime<Utc> },

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::MissingParameter(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::LinkExpired { .. } => 410,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::MissingParameter(name) => format!("Missing query parameter '{}'", name),
            ApiError::Forbidden(msg) => msg.clone(),
            ApiError::LinkExpired { expired_at } => format!("Link expired at {}", expired_at.to_rfc3339()),
            ApiError::ServiceUnavailable(msg) => msg.clone(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::MissingParameter(name) => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code(),
                "parameter": name
            }),
            ApiError::LinkExpired { expired_at } => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code(),
                "expiredAt": expired_at
            }),
            _ => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code()
            }),
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::MissingParameter(_) => "MISSING_PARAMETER",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::LinkExpired { .. } => "LINK_EXPIRED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<SigningError> for ApiError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::MissingParameter(name) => ApiError::MissingParameter(name),
            SigningError::InvalidSignature => ApiError::forbidden("Signature does not match"),
            SigningError::Expired { expired_at } => ApiError::LinkExpired { expired_at },
            SigningError::InvalidPath(path) => ApiError::bad_request(format!("Invalid blob path: {}", path)),
            SigningError::InvalidTtl(secs) => ApiError::bad_request(format!("Invalid link lifetime: {}s", secs)),
            SigningError::InvalidBaseUrl(msg) => {
                // Misconfiguration, not the caller's fault
                tracing::error!("Signer base URL invalid: {}", msg);
                ApiError::service_unavailable("URL signing is not configured")
            }
            SigningError::EmptySecret => {
                tracing::error!("Signing secret is empty; refusing to issue links");
                ApiError::service_unavailable("URL signing is not configured")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
