//! Persisted records.
//!
//! Timestamps are kept as `DateTime<Utc>` in memory and stored as RFC 3339 text
//! with second precision, the only representation every `Any` backend shares.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DbError;

/// Renders a timestamp the way it is stored and compared in the database.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time at the precision the database keeps.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::DecodeError(format!("timestamp '{}': {}", raw, e)))
}

/// Key occupied by a live booking for one session type and start instant.
pub fn slot_key(session_type_id: &str, start_time: &DateTime<Utc>) -> String {
    format!("{}|{}", session_type_id, format_timestamp(start_time))
}

/// An offering a builder sells.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionType {
    pub id: String,
    pub builder_id: String,
    pub title: String,
    pub duration_minutes: i64,
    /// Price in the currency's minor unit; 0 means free.
    pub price_minor: i64,
    pub currency: String,
    pub is_active: bool,
    pub requires_auth: bool,
}

/// Link between an internal session type and the provider's event type.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventMapping {
    pub session_type_id: String,
    pub provider_event_type_id: String,
    pub provider_event_type_uri: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Canceled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Canceled => "canceled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Canceled | BookingStatus::NoShow
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "canceled" => Ok(BookingStatus::Canceled),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(DbError::DecodeError(format!("unknown booking status '{}'", other))),
        }
    }
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotRequired,
    AwaitingPayment,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NotRequired => "not_required",
            PaymentStatus::AwaitingPayment => "awaiting_payment",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Payment no longer blocks confirmation.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::NotRequired | PaymentStatus::Paid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_required" => Ok(PaymentStatus::NotRequired),
            "awaiting_payment" => Ok(PaymentStatus::AwaitingPayment),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DbError::DecodeError(format!("unknown payment status '{}'", other))),
        }
    }
}

/// The fields a booking transition is conditioned on and writes.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingState {
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// The provider reported the invitee as scheduled.
    pub provider_confirmed: bool,
}

/// Source of truth for a scheduled session.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub session_type_id: String,
    pub builder_id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_timezone: String,
    pub notes: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub provider_confirmed: bool,
    pub payment_reference: Option<String>,
    pub provider_event_uri: Option<String>,
    pub provider_invitee_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn state(&self) -> BookingState {
        BookingState {
            status: self.status,
            payment_status: self.payment_status,
            provider_confirmed: self.provider_confirmed,
        }
    }

    /// Whether this booking still holds its slot.
    pub fn holds_slot(&self) -> bool {
        self.status != BookingStatus::Canceled
    }
}

/// Compare-and-swap update of a booking.
///
/// Applied only while the stored state still equals `expected`; correlation
/// fields set to `Some` overwrite the stored value, `None` leaves it alone.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingUpdate {
    pub booking_id: String,
    pub expected: BookingState,
    pub next: BookingState,
    pub payment_reference: Option<String>,
    pub provider_event_uri: Option<String>,
    pub provider_invitee_uri: Option<String>,
}

/// Idempotence anchor for inbound notifications.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEventRecord {
    pub provider_event_id: String,
    pub event_kind: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_error: Option<String>,
    /// Failed processing attempts so far.
    pub attempts: i64,
    /// Raw, signature-verified body kept for deferred processing.
    pub payload: String,
}

impl WebhookEventRecord {
    pub fn received(provider_event_id: &str, event_kind: &str, payload: &str) -> Self {
        Self {
            provider_event_id: provider_event_id.to_string(),
            event_kind: event_kind.to_string(),
            received_at: now_utc(),
            processed_at: None,
            processing_error: None,
            attempts: 0,
            payload: payload.to_string(),
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// Result of closing a webhook record together with its booking change.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Record marked processed; carries the booking as written, if one was updated.
    Completed(Option<Booking>),
    /// Another delivery already processed this event.
    AlreadyProcessed,
    /// The booking changed since it was read; nothing was written.
    BookingChanged,
}
