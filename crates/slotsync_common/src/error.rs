// --- File: crates/slotsync_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type shared by all slotsync crates.
///
/// Each crate keeps its own error enum and implements `From<ItsError> for SlotsyncError`
/// so handlers can fall back to one response shape.
#[derive(Error, Debug)]
pub enum SlotsyncError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a conflict (e.g., resource already exists)
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to rate limiting
    #[error("Rate limited: {0}")]
    RateLimitError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Maps an error onto the HTTP status code a handler should answer with.
pub trait HttpStatusCode {
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for SlotsyncError {
    fn status_code(&self) -> u16 {
        match self {
            SlotsyncError::HttpError(_) => 500,
            SlotsyncError::ParseError(_) => 400,
            SlotsyncError::ConfigError(_) => 500,
            SlotsyncError::AuthError(_) => 401,
            SlotsyncError::ValidationError(_) => 400,
            SlotsyncError::DatabaseError(_) => 500,
            SlotsyncError::ExternalServiceError { .. } => 502,
            SlotsyncError::ConflictError(_) => 409,
            SlotsyncError::NotFoundError(_) => 404,
            SlotsyncError::TimeoutError(_) => 504,
            SlotsyncError::RateLimitError(_) => 429,
            SlotsyncError::InternalError(_) => 500,
        }
    }
}

impl From<reqwest::Error> for SlotsyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlotsyncError::TimeoutError(err.to_string())
        } else {
            SlotsyncError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlotsyncError {
    fn from(err: serde_json::Error) -> Self {
        SlotsyncError::ParseError(err.to_string())
    }
}

/// Error for a failed call to a named external service.
pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> SlotsyncError {
    SlotsyncError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(SlotsyncError::NotFoundError("booking".into()).status_code(), 404);
        assert_eq!(SlotsyncError::ConflictError("slot".into()).status_code(), 409);
        assert_eq!(external_service_error("provider", "boom").status_code(), 502);
        assert_eq!(SlotsyncError::RateLimitError("slow down".into()).status_code(), 429);
    }

    #[test]
    fn json_errors_are_parse_errors() {
        let err: SlotsyncError = serde_json::from_str::<u8>("x").unwrap_err().into();
        assert_eq!(err.status_code(), 400);
    }
}
