use slotsync_common::{external_service_error, signature::SignatureError, HttpStatusCode, SlotsyncError};
use thiserror::Error;

/// Stripe-specific error types.
#[derive(Error, Debug)]
pub enum StripeError {
    /// Error occurred during a Stripe API request
    #[error("Stripe API request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Error returned by the Stripe API
    #[error("Stripe API returned an error: {message} (Status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// Error parsing Stripe API response
    #[error("Failed to parse Stripe API response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing or incomplete Stripe configuration
    #[error("Stripe configuration missing or incomplete: {0}")]
    ConfigError(String),

    /// Webhook signature verification failed
    #[error("Stripe webhook signature verification failed: {0}")]
    WebhookSignatureError(#[from] SignatureError),

    /// The payment request cannot be turned into a checkout session
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
}

impl From<StripeError> for SlotsyncError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::RequestError(e) => SlotsyncError::HttpError(format!("Stripe request error: {}", e)),
            StripeError::ApiError { status_code, message } => external_service_error(
                "Stripe API",
                format!("Status: {}, Message: {}", status_code, message),
            ),
            StripeError::ParseError(e) => SlotsyncError::ParseError(format!("Stripe response parse error: {}", e)),
            StripeError::ConfigError(msg) => SlotsyncError::ConfigError(msg),
            StripeError::WebhookSignatureError(e) => {
                SlotsyncError::AuthError(format!("Stripe webhook signature error: {}", e))
            }
            StripeError::InvalidRequest(msg) => SlotsyncError::ValidationError(msg),
        }
    }
}

impl HttpStatusCode for StripeError {
    fn status_code(&self) -> u16 {
        match self {
            StripeError::RequestError(_) => 502,
            StripeError::ApiError { .. } => 502,
            StripeError::ParseError(_) => 502,
            StripeError::ConfigError(_) => 500,
            StripeError::WebhookSignatureError(_) => 401,
            StripeError::InvalidRequest(_) => 400,
        }
    }
}
