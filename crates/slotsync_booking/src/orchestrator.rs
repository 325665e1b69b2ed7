//! Booking confirmation.
//!
//! A confirmation re-validates the chosen slot, reserves it with a pending
//! booking (the store's slot uniqueness decides concurrent races), and starts a
//! payment when the session type has a price. The booking reaches `confirmed`
//! later, through [`crate::transitions`], once the provider and (if needed) the
//! payment processor have both reported success.

use std::sync::Arc;

use slotsync_common::services::{BoxedError, PaymentHandle, PaymentRequest, PaymentService};
use slotsync_db::models::now_utc;
use slotsync_db::{Booking, BookingRepository, BookingStatus, DbError, PaymentStatus, SessionType};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::availability::AvailabilityService;
use crate::error::BookingError;
use crate::models::{ConfirmBookingRequest, ConfirmBookingResponse};
use crate::transitions::{plan_update, BookingEvent, Correlation};

/// Optimistic updates give up after this many lost races.
pub(crate) const MAX_CAS_ATTEMPTS: usize = 5;

pub type SharedPaymentService = Arc<dyn PaymentService<Error = BoxedError>>;

pub struct BookingOrchestrator {
    bookings: Arc<dyn BookingRepository>,
    availability: Arc<AvailabilityService>,
    payments: Option<SharedPaymentService>,
}

impl BookingOrchestrator {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        availability: Arc<AvailabilityService>,
        payments: Option<SharedPaymentService>,
    ) -> Self {
        Self {
            bookings,
            availability,
            payments,
        }
    }

    pub async fn confirm_booking(
        &self,
        request: ConfirmBookingRequest,
    ) -> Result<ConfirmBookingResponse, BookingError> {
        request.validate()?;
        let session_type = self
            .availability
            .active_session_type(&request.session_type_id)
            .await?;

        let slot = self
            .availability
            .revalidate_slot(
                &request.session_type_id,
                request.time_slot.start_time,
                request.time_slot.end_time,
            )
            .await?;

        let payment_required = session_type.price_minor > 0;
        let now = now_utc();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            session_type_id: session_type.id.clone(),
            builder_id: session_type.builder_id.clone(),
            client_name: request.client_details.name.trim().to_string(),
            client_email: request.client_details.email.trim().to_string(),
            client_timezone: request.client_details.timezone.clone(),
            notes: request.notes.clone(),
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: BookingStatus::Pending,
            payment_status: if payment_required {
                PaymentStatus::AwaitingPayment
            } else {
                PaymentStatus::NotRequired
            },
            provider_confirmed: false,
            payment_reference: None,
            provider_event_uri: None,
            provider_invitee_uri: None,
            created_at: now,
            updated_at: now,
        };

        let booking = match self.bookings.insert(booking).await {
            Ok(booking) => booking,
            Err(DbError::UniqueViolation(_)) => {
                info!(
                    "Slot {} of session type {} was reserved concurrently",
                    slot.start_time, session_type.id
                );
                return Err(BookingError::SlotConflict(slot.start_time.to_rfc3339()));
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            "Booking {} reserved slot {} of session type {} (payment required: {})",
            booking.id, booking.start_time, booking.session_type_id, payment_required
        );

        let scheduling_url = Some(with_booking_reference(&slot.scheduling_handle, &booking.id));

        if !payment_required {
            return Ok(ConfirmBookingResponse {
                booking_id: booking.id,
                status: booking.status,
                payment_status: booking.payment_status,
                payment_required,
                payment_handle: None,
                scheduling_url,
            });
        }

        let handle = match self.initiate_payment(&session_type, &booking).await {
            Ok(handle) => handle,
            Err(reason) => {
                warn!("Payment initiation for booking {} failed: {}", booking.id, reason);
                self.cancel_unpaid(&booking.id).await;
                return Err(BookingError::PaymentInitiationFailed(reason));
            }
        };
        self.attach_payment_reference(&booking, &handle.reference).await;

        Ok(ConfirmBookingResponse {
            booking_id: booking.id,
            status: booking.status,
            payment_status: booking.payment_status,
            payment_required,
            payment_handle: Some(handle),
            scheduling_url,
        })
    }

    /// Feeds a payment result into the two-phase join.
    pub async fn record_payment_outcome(
        &self,
        booking_id: &str,
        succeeded: bool,
        reference: Option<String>,
    ) -> Result<Booking, BookingError> {
        let event = if succeeded {
            BookingEvent::PaymentSucceeded
        } else {
            BookingEvent::PaymentFailed
        };
        let correlation = Correlation {
            payment_reference: reference,
            ..Correlation::default()
        };

        for _ in 0..MAX_CAS_ATTEMPTS {
            let booking = self.get_booking(booking_id).await?;
            let Some(update) = plan_update(&booking, event, &correlation).inspect_err(|e| {
                warn!("Ignoring payment outcome: {}", e);
            })?
            else {
                return Ok(booking);
            };
            if let Some(updated) = self.bookings.apply_update(update).await? {
                info!(
                    "Booking {} payment {} -> status {}, payment {}",
                    updated.id, event, updated.status, updated.payment_status
                );
                return Ok(updated);
            }
        }
        Err(BookingError::Storage(format!(
            "booking {} kept changing while recording payment",
            booking_id
        )))
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, BookingError> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))
    }

    async fn initiate_payment(
        &self,
        session_type: &SessionType,
        booking: &Booking,
    ) -> Result<PaymentHandle, String> {
        let payments = self
            .payments
            .as_ref()
            .ok_or_else(|| "no payment processor is configured".to_string())?;
        payments
            .initiate_payment(PaymentRequest {
                booking_id: booking.id.clone(),
                amount_minor: session_type.price_minor,
                currency: session_type.currency.clone(),
                description: session_type.title.clone(),
                customer_email: Some(booking.client_email.clone()),
            })
            .await
            .map_err(|e| e.to_string())
    }

    /// Releases the slot of a booking whose payment never started.
    ///
    /// Re-reads the booking on every attempt, so a webhook landing in between
    /// does not leave it pending.
    async fn cancel_unpaid(&self, booking_id: &str) {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            match self.record_payment_outcome(booking_id, false, None).await {
                Ok(booking) => {
                    info!(
                        "Booking {} {} after payment initiation failure",
                        booking.id, booking.status
                    );
                    return;
                }
                Err(e @ BookingError::InvalidTransition { .. }) => {
                    warn!("Booking {} cannot be canceled: {}", booking_id, e);
                    return;
                }
                Err(e) => warn!(
                    "Attempt {} to cancel booking {} failed: {}",
                    attempt, booking_id, e
                ),
            }
        }
        error!(
            "Booking {} still holds its slot after {} cancel attempts",
            booking_id, MAX_CAS_ATTEMPTS
        );
    }

    /// Best effort: the processor echoes the booking id, so a missing reference
    /// does not block reconciliation.
    async fn attach_payment_reference(&self, booking: &Booking, reference: &str) {
        let mut update = match plan_update(booking, BookingEvent::PaymentSucceeded, &Correlation::default()) {
            Ok(Some(update)) => update,
            _ => return,
        };
        // Same state in and out; only the reference is written.
        update.next = update.expected;
        update.payment_reference = Some(reference.to_string());
        if let Err(e) = self.bookings.apply_update(update).await {
            warn!("Could not store payment reference for booking {}: {}", booking.id, e);
        }
    }
}

/// Appends the booking id as `utm_content`, which the provider echoes back in
/// its notifications.
pub fn with_booking_reference(scheduling_handle: &str, booking_id: &str) -> String {
    let separator = if scheduling_handle.contains('?') { '&' } else { '?' };
    format!("{}{}utm_content={}", scheduling_handle, separator, booking_id)
}
