//! Webhook ingestion.
//!
//! Every notification goes through the same pipeline: verify the signature on
//! the raw bytes, parse, store a [`WebhookEventRecord`] keyed by (event id,
//! kind), then apply the booking transition and mark the record processed in
//! one transaction. A record that fails processing stays stored with its error
//! and is picked up again by [`crate::reconcile::Reconciler`].
//!
//! Payment results use the same record table. Their kind is
//! [`PAYMENT_KIND_PREFIX`] followed by the processor's event type, and their
//! payload is a serialized [`PaymentOutcome`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slotsync_common::logging::SECURITY_TARGET;
use slotsync_common::signature::verify_signature;
use slotsync_db::{Booking, BookingStatus, CompletionOutcome, Repositories, WebhookEventRecord};
use tracing::{debug, info, warn};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::BookingError;
use crate::orchestrator::MAX_CAS_ATTEMPTS;
use crate::signing::SigningSecretManager;
use crate::transitions::{plan_update, BookingEvent, Correlation};

pub const PAYMENT_KIND_PREFIX: &str = "payment:";

/// A payment result, as stored for processing and replay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub booking_id: String,
    pub succeeded: bool,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Acknowledgement body of the webhook endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The booking moved to `status`.
    Applied {
        booking_id: String,
        status: BookingStatus,
    },
    /// The booking already reflected the event.
    Unchanged { booking_id: String },
    /// This event was processed before.
    Duplicate,
    /// Not an event kind bookings react to.
    Ignored { event_kind: String },
    /// The transition is not allowed; the event is closed without effect.
    Rejected { booking_id: String, reason: String },
    /// Stored, but processing failed; reconciliation retries it.
    Deferred { reason: String },
}

/// Provider notification envelope (Calendly v2 shape).
#[derive(Deserialize, Debug, Clone)]
pub struct ProviderWebhook {
    pub event: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub payload: InviteePayload,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct InviteePayload {
    /// Invitee URI; for no-show notifications the no-show record's URI.
    pub uri: String,
    /// Invitee URI of a no-show notification.
    #[serde(default)]
    pub invitee: Option<String>,
    /// Scheduled event URI.
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub scheduled_event: Option<ScheduledEvent>,
    #[serde(default)]
    pub tracking: Option<Tracking>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub rescheduled: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ScheduledEvent {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_type: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Tracking {
    /// Carries the local booking id appended to the scheduling link.
    #[serde(default)]
    pub utm_content: Option<String>,
}

impl InviteePayload {
    fn invitee_uri(&self) -> Option<&str> {
        match &self.invitee {
            Some(invitee) => Some(invitee.as_str()),
            None if self.uri.contains("/invitees/") => Some(self.uri.as_str()),
            None => None,
        }
    }

    fn event_uri(&self) -> Option<&str> {
        self.event
            .as_deref()
            .or_else(|| self.scheduled_event.as_ref().and_then(|e| e.uri.as_deref()))
    }

    fn correlation(&self) -> Correlation {
        Correlation {
            payment_reference: None,
            provider_event_uri: self.event_uri().map(str::to_string),
            provider_invitee_uri: self.invitee_uri().map(str::to_string),
        }
    }
}

pub struct WebhookProcessor {
    repos: Repositories,
    secrets: Arc<SigningSecretManager>,
    tolerance_secs: i64,
}

impl WebhookProcessor {
    pub fn new(repos: Repositories, secrets: Arc<SigningSecretManager>, tolerance_secs: i64) -> Self {
        Self {
            repos,
            secrets,
            tolerance_secs,
        }
    }

    /// Entry point for provider deliveries.
    ///
    /// Errors mean the delivery was not stored: a bad signature, an unreadable
    /// body or a storage failure. Everything else is acknowledged.
    pub async fn handle_webhook(
        &self,
        raw_payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, BookingError> {
        let keys = self.secrets.verification_keys().await;
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        if let Err(e) = verify_signature(
            raw_payload,
            signature_header,
            &key_refs,
            self.tolerance_secs,
            Utc::now().timestamp(),
        ) {
            warn!(target: SECURITY_TARGET, "Discarding provider webhook: {}", e);
            return Err(BookingError::SignatureInvalid(e.to_string()));
        }

        let body = std::str::from_utf8(raw_payload)
            .map_err(|e| BookingError::MalformedPayload(format!("body is not UTF-8: {}", e)))?;
        let webhook: ProviderWebhook = serde_json::from_str(body)
            .map_err(|e| BookingError::MalformedPayload(e.to_string()))?;
        if webhook.event.is_empty() || webhook.payload.uri.is_empty() {
            return Err(BookingError::MalformedPayload(
                "event kind and payload uri are required".to_string(),
            ));
        }
        debug!("Verified provider webhook {} ({})", webhook.payload.uri, webhook.event);

        self.ingest(&webhook.payload.uri, &webhook.event, body).await
    }

    /// Entry point for payment processor results that were already verified.
    pub async fn handle_payment_notification(
        &self,
        event_id: &str,
        event_type: &str,
        outcome: PaymentOutcome,
    ) -> Result<WebhookOutcome, BookingError> {
        let kind = format!("{}{}", PAYMENT_KIND_PREFIX, event_type);
        let payload = serde_json::to_string(&outcome)
            .map_err(|e| BookingError::MalformedPayload(e.to_string()))?;
        self.ingest(event_id, &kind, &payload).await
    }

    async fn ingest(
        &self,
        event_id: &str,
        event_kind: &str,
        payload: &str,
    ) -> Result<WebhookOutcome, BookingError> {
        let record = WebhookEventRecord::received(event_id, event_kind, payload);
        let fresh = self.repos.webhook_events.record_received(record.clone()).await?;
        if !fresh {
            let processed = self
                .repos
                .webhook_events
                .find(event_id, event_kind)
                .await?
                .is_some_and(|existing| existing.is_processed());
            if processed {
                info!("Duplicate delivery of {} ({}) acknowledged", event_id, event_kind);
                return Ok(WebhookOutcome::Duplicate);
            }
            debug!("Redelivery of unprocessed event {} ({}); processing now", event_id, event_kind);
        }
        self.process_record(&record).await
    }

    /// Processes a stored record. Used for fresh deliveries and for replays.
    ///
    /// Rejected transitions close the record; any other failure leaves it
    /// unprocessed with the error stored.
    pub async fn process_record(
        &self,
        record: &WebhookEventRecord,
    ) -> Result<WebhookOutcome, BookingError> {
        let id = record.provider_event_id.as_str();
        let kind = record.event_kind.as_str();
        match self.try_process(record).await {
            Ok(outcome) => Ok(outcome),
            Err(BookingError::InvalidTransition {
                booking_id,
                from,
                event,
            }) => {
                let reason = format!("{} is not allowed from {}", event, from);
                warn!("Event {} ({}) rejected for booking {}: {}", id, kind, booking_id, reason);
                match self.repos.webhook_events.complete_with_transition(id, kind, None).await? {
                    CompletionOutcome::AlreadyProcessed => Ok(WebhookOutcome::Duplicate),
                    _ => Ok(WebhookOutcome::Rejected { booking_id, reason }),
                }
            }
            Err(e) => {
                warn!("Processing of {} ({}) deferred: {}", id, kind, e);
                self.repos
                    .webhook_events
                    .mark_failed(id, kind, &e.to_string())
                    .await?;
                Ok(WebhookOutcome::Deferred {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn try_process(&self, record: &WebhookEventRecord) -> Result<WebhookOutcome, BookingError> {
        let id = record.provider_event_id.as_str();
        let kind = record.event_kind.as_str();

        if kind.starts_with(PAYMENT_KIND_PREFIX) {
            let outcome: PaymentOutcome = serde_json::from_str(&record.payload)
                .map_err(|e| BookingError::MalformedPayload(e.to_string()))?;
            let event = if outcome.succeeded {
                BookingEvent::PaymentSucceeded
            } else {
                BookingEvent::PaymentFailed
            };
            let correlation = Correlation {
                payment_reference: outcome.reference.clone(),
                ..Correlation::default()
            };
            return self
                .transition(id, kind, &outcome.booking_id, event, &correlation)
                .await;
        }

        let Some(event) = BookingEvent::from_webhook_kind(kind) else {
            self.repos.webhook_events.complete_with_transition(id, kind, None).await?;
            debug!("Ignoring provider event kind {}", kind);
            return Ok(WebhookOutcome::Ignored {
                event_kind: kind.to_string(),
            });
        };

        let webhook: ProviderWebhook = serde_json::from_str(&record.payload)
            .map_err(|e| BookingError::MalformedPayload(e.to_string()))?;
        let booking = self.locate_booking(&webhook.payload).await?;
        self.transition(id, kind, &booking.id, event, &webhook.payload.correlation())
            .await
    }

    /// Finds the booking a provider notification refers to.
    ///
    /// Provider ids stored on an earlier match win. The booking id echoed back
    /// in `utm_content` is only trusted when the scheduled event is the slot
    /// that booking holds. Otherwise falls back to the mapped session type and
    /// the start time.
    async fn locate_booking(&self, payload: &InviteePayload) -> Result<Booking, BookingError> {
        let bookings = &self.repos.bookings;

        if let Some(uri) = payload.invitee_uri() {
            if let Some(booking) = bookings.find_by_invitee_uri(uri).await? {
                return Ok(booking);
            }
        }
        if let Some(uri) = payload.event_uri() {
            if let Some(booking) = bookings.find_by_event_uri(uri).await? {
                return Ok(booking);
            }
        }

        let scheduled = payload.scheduled_event.as_ref();
        if let Some(booking_id) = payload
            .tracking
            .as_ref()
            .and_then(|t| t.utm_content.as_deref())
            .filter(|id| !id.is_empty())
        {
            if let Some(booking) = bookings.find_by_id(booking_id).await? {
                if self.holds_scheduled_slot(&booking, scheduled).await? {
                    return Ok(booking);
                }
                warn!(
                    target: SECURITY_TARGET,
                    "Provider invitee {} names booking {} but is for a different slot",
                    payload.uri, booking.id
                );
            }
        }

        if let (Some(event_type_uri), Some(start_time)) = (
            scheduled.and_then(|e| e.event_type.as_deref()),
            scheduled.and_then(|e| e.start_time),
        ) {
            if let Some(mapping) = self
                .repos
                .event_mappings
                .find_by_event_type_uri(event_type_uri)
                .await?
            {
                if let Some(booking) = bookings
                    .find_by_slot(&mapping.session_type_id, start_time)
                    .await?
                {
                    debug!(
                        "Matched provider invitee {} to booking {} by slot",
                        payload.uri, booking.id
                    );
                    return Ok(booking);
                }
            }
        }

        Err(BookingError::BookingNotFound(format!(
            "no booking matches provider invitee {}",
            payload.uri
        )))
    }

    /// Whether `scheduled` is the booking's slot: same start, and an event type
    /// mapped to the booking's session type.
    async fn holds_scheduled_slot(
        &self,
        booking: &Booking,
        scheduled: Option<&ScheduledEvent>,
    ) -> Result<bool, BookingError> {
        let (Some(event_type_uri), Some(start_time)) = (
            scheduled.and_then(|e| e.event_type.as_deref()),
            scheduled.and_then(|e| e.start_time),
        ) else {
            return Ok(false);
        };
        if start_time != booking.start_time {
            return Ok(false);
        }
        Ok(self
            .repos
            .event_mappings
            .find_by_event_type_uri(event_type_uri)
            .await?
            .is_some_and(|mapping| mapping.session_type_id == booking.session_type_id))
    }

    /// Applies `event` and closes the record in one transaction, re-reading the
    /// booking when a concurrent writer got there first.
    async fn transition(
        &self,
        event_id: &str,
        event_kind: &str,
        booking_id: &str,
        event: BookingEvent,
        correlation: &Correlation,
    ) -> Result<WebhookOutcome, BookingError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let booking = self
                .repos
                .bookings
                .find_by_id(booking_id)
                .await?
                .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;
            let update = plan_update(&booking, event, correlation)?;

            match self
                .repos
                .webhook_events
                .complete_with_transition(event_id, event_kind, update)
                .await?
            {
                CompletionOutcome::Completed(Some(updated)) => {
                    info!(
                        "Booking {} {} -> {} (payment {}) on {}",
                        updated.id, booking.status, updated.status, updated.payment_status, event
                    );
                    return Ok(WebhookOutcome::Applied {
                        booking_id: updated.id,
                        status: updated.status,
                    });
                }
                CompletionOutcome::Completed(None) => {
                    debug!("Booking {} already reflects {}", booking.id, event);
                    return Ok(WebhookOutcome::Unchanged {
                        booking_id: booking.id,
                    });
                }
                CompletionOutcome::AlreadyProcessed => return Ok(WebhookOutcome::Duplicate),
                CompletionOutcome::BookingChanged => {
                    debug!("Booking {} changed concurrently; retrying {}", booking.id, event);
                }
            }
        }
        Err(BookingError::Storage(format!(
            "booking {} kept changing while applying {}",
            booking_id, event
        )))
    }
}
