use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use slotsync_common::{external_service_error, HttpStatusCode, SlotsyncError};
use slotsync_db::{BookingStatus, DbError};
use slotsync_provider::ProviderError;
use thiserror::Error;

/// Failures of the booking core.
///
/// Every variant is either worth retrying (see [`BookingError::is_retryable`]) or
/// terminal for the current attempt; clients use that split to decide whether to
/// re-offer availability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Scheduling provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Scheduling provider rejected our credentials: {0}")]
    ProviderAuthError(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Mapping not found: {0}")]
    MappingNotFound(String),

    #[error("Session type {0} is not active")]
    SessionTypeInactive(String),

    #[error("Session type {0} not found")]
    SessionTypeNotFound(String),

    #[error("Booking {0} not found")]
    BookingNotFound(String),

    #[error("Slot starting {0} is no longer available")]
    SlotNoLongerAvailable(String),

    #[error("Slot starting {0} was taken by a concurrent booking")]
    SlotConflict(String),

    #[error("Payment could not be initiated: {0}")]
    PaymentInitiationFailed(String),

    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("Booking {booking_id} in state {from} cannot take event {event}")]
    InvalidTransition {
        booking_id: String,
        from: BookingStatus,
        event: String,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    /// "Try again" rather than "this booking cannot proceed".
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::ProviderUnavailable(_)
                | BookingError::SlotNoLongerAvailable(_)
                | BookingError::SlotConflict(_)
                | BookingError::Storage(_)
        )
    }

    /// Stable machine-readable name, used in response bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::ProviderUnavailable(_) => "provider_unavailable",
            BookingError::ProviderAuthError(_) => "provider_auth_error",
            BookingError::InvalidDateRange(_) => "invalid_date_range",
            BookingError::MappingNotFound(_) => "mapping_not_found",
            BookingError::SessionTypeInactive(_) => "session_type_inactive",
            BookingError::SessionTypeNotFound(_) => "session_type_not_found",
            BookingError::BookingNotFound(_) => "booking_not_found",
            BookingError::SlotNoLongerAvailable(_) => "slot_no_longer_available",
            BookingError::SlotConflict(_) => "slot_conflict",
            BookingError::PaymentInitiationFailed(_) => "payment_initiation_failed",
            BookingError::SignatureInvalid(_) => "signature_invalid",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::MalformedPayload(_) => "malformed_payload",
            BookingError::Configuration(_) => "configuration",
            BookingError::Storage(_) => "storage",
        }
    }
}

impl From<ProviderError> for BookingError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => BookingError::ProviderUnavailable(msg),
            ProviderError::Auth { status, message } => {
                BookingError::ProviderAuthError(format!("status {}: {}", status, message))
            }
            ProviderError::InvalidDateRange(msg) => BookingError::InvalidDateRange(msg),
            ProviderError::Api { status, message } => {
                BookingError::ProviderUnavailable(format!("status {}: {}", status, message))
            }
            ProviderError::Decode(msg) => {
                BookingError::ProviderUnavailable(format!("unreadable response: {}", msg))
            }
            ProviderError::Configuration(msg) => BookingError::Configuration(msg),
        }
    }
}

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        BookingError::Storage(err.to_string())
    }
}

impl From<BookingError> for SlotsyncError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::ProviderUnavailable(_) | BookingError::ProviderAuthError(_) => {
                external_service_error("Scheduling provider", message)
            }
            BookingError::InvalidDateRange(_)
            | BookingError::SessionTypeInactive(_)
            | BookingError::MappingNotFound(_)
            | BookingError::MalformedPayload(_) => SlotsyncError::ValidationError(message),
            BookingError::SessionTypeNotFound(_) | BookingError::BookingNotFound(_) => {
                SlotsyncError::NotFoundError(message)
            }
            BookingError::SlotNoLongerAvailable(_)
            | BookingError::SlotConflict(_)
            | BookingError::InvalidTransition { .. } => SlotsyncError::ConflictError(message),
            BookingError::PaymentInitiationFailed(_) => external_service_error("Payment", message),
            BookingError::SignatureInvalid(_) => SlotsyncError::AuthError(message),
            BookingError::Configuration(_) => SlotsyncError::ConfigError(message),
            BookingError::Storage(_) => SlotsyncError::DatabaseError(message),
        }
    }
}

impl HttpStatusCode for BookingError {
    fn status_code(&self) -> u16 {
        match self {
            BookingError::ProviderUnavailable(_) => 503,
            BookingError::ProviderAuthError(_) => 502,
            BookingError::InvalidDateRange(_) => 400,
            BookingError::MappingNotFound(_) => 422,
            BookingError::SessionTypeInactive(_) => 422,
            BookingError::SessionTypeNotFound(_) => 404,
            BookingError::BookingNotFound(_) => 404,
            BookingError::SlotNoLongerAvailable(_) => 409,
            BookingError::SlotConflict(_) => 409,
            BookingError::PaymentInitiationFailed(_) => 402,
            BookingError::SignatureInvalid(_) => 401,
            BookingError::InvalidTransition { .. } => 409,
            BookingError::MalformedPayload(_) => 400,
            BookingError::Configuration(_) => 500,
            BookingError::Storage(_) => 500,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
                "code": status.as_u16(),
                "retryable": self.is_retryable(),
            }
        }));
        (status, body).into_response()
    }
}
