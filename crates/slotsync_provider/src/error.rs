use slotsync_common::{external_service_error, HttpStatusCode, SlotsyncError};
use thiserror::Error;

/// Errors raised by the scheduling provider client.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network failure, timeout, 429 or 5xx after the retry budget was spent.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// 401/403: the API token is missing, revoked or lacks scope.
    #[error("Provider rejected credentials (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// Any other non-success answer.
    #[error("Provider API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Provider client configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

impl From<ProviderError> for SlotsyncError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => external_service_error("Scheduling provider", msg),
            ProviderError::Auth { message, .. } => SlotsyncError::AuthError(message),
            ProviderError::InvalidDateRange(msg) => SlotsyncError::ValidationError(msg),
            ProviderError::Api { status, message } => external_service_error(
                "Scheduling provider",
                format!("Status: {}, Message: {}", status, message),
            ),
            ProviderError::Decode(msg) => SlotsyncError::ParseError(msg),
            ProviderError::Configuration(msg) => SlotsyncError::ConfigError(msg),
        }
    }
}

impl HttpStatusCode for ProviderError {
    fn status_code(&self) -> u16 {
        match self {
            ProviderError::Unavailable(_) => 503,
            ProviderError::Auth { .. } => 502,
            ProviderError::InvalidDateRange(_) => 400,
            ProviderError::Api { .. } => 502,
            ProviderError::Decode(_) => 502,
            ProviderError::Configuration(_) => 500,
        }
    }
}
