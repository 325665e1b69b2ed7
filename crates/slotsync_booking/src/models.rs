//! Request and response bodies of the booking API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use slotsync_common::services::PaymentHandle;
use slotsync_db::{BookingStatus, PaymentStatus};
use slotsync_provider::{TimeSlot, WebhookSubscription};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::BookingError;

#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AvailabilityRequest {
    #[cfg_attr(feature = "openapi", schema(example = "st-60"))]
    pub session_type_id: String,
    /// `YYYY-MM-DD` (start of day, UTC) or an RFC 3339 instant.
    #[cfg_attr(feature = "openapi", schema(example = "2030-06-01"))]
    pub start_date: String,
    /// `YYYY-MM-DD` (inclusive, through end of day UTC) or an RFC 3339 instant.
    #[cfg_attr(feature = "openapi", schema(example = "2030-06-07"))]
    pub end_date: String,
}

impl AvailabilityRequest {
    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), BookingError> {
        let start = parse_bound(&self.start_date, false)?;
        let end = parse_bound(&self.end_date, true)?;
        if end <= start {
            return Err(BookingError::InvalidDateRange(format!(
                "end_date {} is not after start_date {}",
                self.end_date, self.start_date
            )));
        }
        Ok((start, end))
    }
}

/// Parses a window bound; a plain date used as an end bound covers the whole day.
fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, BookingError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        BookingError::InvalidDateRange(format!(
            "'{}' is neither YYYY-MM-DD nor an RFC 3339 timestamp",
            raw
        ))
    })?;
    let day = if end_of_day { date.succ_opt() } else { Some(date) };
    day.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| BookingError::InvalidDateRange(format!("'{}' is out of range", raw)))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SlotView {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub scheduling_handle: String,
}

impl From<TimeSlot> for SlotView {
    fn from(slot: TimeSlot) -> Self {
        Self {
            start_time: slot.start_time,
            end_time: slot.end_time,
            scheduling_handle: slot.scheduling_handle,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AvailabilityResponse {
    pub time_slots: Vec<SlotView>,
}

/// The slot the client picked from an availability response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SlotSelection {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub scheduling_handle: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ClientDetails {
    #[cfg_attr(feature = "openapi", schema(example = "Ada Lovelace"))]
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(example = "ada@example.com"))]
    pub email: String,
    #[serde(default = "default_timezone")]
    #[cfg_attr(feature = "openapi", schema(example = "Europe/London"))]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ConfirmBookingRequest {
    pub session_type_id: String,
    pub time_slot: SlotSelection,
    pub client_details: ClientDetails,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ConfirmBookingRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        let client = &self.client_details;
        if client.name.trim().is_empty() {
            return Err(BookingError::MalformedPayload("client name is required".to_string()));
        }
        let email = client.email.trim();
        if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(BookingError::MalformedPayload(format!(
                "'{}' is not a valid email address",
                client.email
            )));
        }
        if self.time_slot.end_time <= self.time_slot.start_time {
            return Err(BookingError::InvalidDateRange(
                "time slot ends before it starts".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ConfirmBookingResponse {
    pub booking_id: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_required: bool,
    pub payment_handle: Option<PaymentHandle>,
    /// Provider page where the invitee completes the reservation; carries the
    /// booking id so the provider's notification can be matched back.
    pub scheduling_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PaymentOutcomeRequest {
    pub succeeded: bool,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LinkMappingRequest {
    /// Provider-assigned event type id, as listed by discovery.
    #[cfg_attr(feature = "openapi", schema(example = "ABCDEF123"))]
    pub provider_event_type_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProvisionSubscriptionRequest {
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProvisionSubscriptionResponse {
    pub subscription: WebhookSubscription,
    /// The new signing key. Shown once; persist it in the secret store.
    pub signing_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ReconcileReport {
    /// Stored events processed on this run.
    pub replayed: usize,
    /// Stored events that failed again and stay queued.
    pub still_failing: usize,
    /// Stored events closed unapplied after too many failed attempts.
    #[serde(default)]
    pub abandoned: usize,
    /// Confirmed bookings moved to `completed`.
    pub completed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(start: &str, end: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), BookingError> {
        AvailabilityRequest {
            session_type_id: "st".into(),
            start_date: start.into(),
            end_date: end.into(),
        }
        .window()
    }

    #[test]
    fn date_only_end_covers_the_whole_day() {
        let (start, end) = window("2030-06-01", "2030-06-07").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2030, 6, 8, 0, 0, 0).unwrap());
    }

    #[test]
    fn same_day_window_is_one_day_long() {
        let (start, end) = window("2030-06-01", "2030-06-01").unwrap();
        assert_eq!(end - start, chrono::Duration::days(1));
    }

    #[test]
    fn instants_are_taken_verbatim() {
        let (start, _) = window("2030-06-01T10:00:00+02:00", "2030-06-02").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn inverted_or_garbage_windows_are_invalid() {
        assert!(matches!(window("2030-06-07", "2030-06-01"), Err(BookingError::InvalidDateRange(_))));
        assert!(matches!(window("next week", "2030-06-01"), Err(BookingError::InvalidDateRange(_))));
    }

    #[test]
    fn confirm_request_requires_contact_details() {
        let start = Utc.with_ymd_and_hms(2030, 6, 1, 10, 0, 0).unwrap();
        let mut request = ConfirmBookingRequest {
            session_type_id: "st".into(),
            time_slot: SlotSelection {
                start_time: start,
                end_time: start + chrono::Duration::hours(1),
                scheduling_handle: None,
            },
            client_details: ClientDetails {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                timezone: "UTC".into(),
            },
            notes: None,
        };
        assert!(request.validate().is_ok());

        request.client_details.email = "ada.example.com".into();
        assert!(matches!(request.validate(), Err(BookingError::MalformedPayload(_))));
    }
}
