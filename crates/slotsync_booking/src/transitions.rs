//! Booking state machine.
//!
//! Pure functions over [`BookingState`]; persistence applies the result as a
//! compare-and-swap. A booking becomes `confirmed` only once the provider has
//! confirmed the invitee *and* payment is settled, in whichever order the two
//! reports arrive. Terminal states never change again.

use std::fmt;

use slotsync_db::{Booking, BookingState, BookingStatus, BookingUpdate, PaymentStatus};

use crate::error::BookingError;

/// Something that happened to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingEvent {
    /// `invitee.created`: the provider holds the calendar slot.
    ProviderConfirmed,
    /// `invitee.canceled`
    ProviderCanceled,
    /// `invitee_no_show.created`
    ProviderNoShow,
    PaymentSucceeded,
    PaymentFailed,
    /// The session ended; set by the reconciliation sweep.
    Completed,
}

pub const INVITEE_CREATED: &str = "invitee.created";
pub const INVITEE_CANCELED: &str = "invitee.canceled";
pub const INVITEE_NO_SHOW: &str = "invitee_no_show.created";

impl BookingEvent {
    /// Maps a provider webhook kind. Unknown kinds map to `None` and are ignored.
    pub fn from_webhook_kind(kind: &str) -> Option<Self> {
        match kind {
            INVITEE_CREATED => Some(BookingEvent::ProviderConfirmed),
            INVITEE_CANCELED => Some(BookingEvent::ProviderCanceled),
            INVITEE_NO_SHOW => Some(BookingEvent::ProviderNoShow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEvent::ProviderConfirmed => "provider_confirmed",
            BookingEvent::ProviderCanceled => "provider_canceled",
            BookingEvent::ProviderNoShow => "provider_no_show",
            BookingEvent::PaymentSucceeded => "payment_succeeded",
            BookingEvent::PaymentFailed => "payment_failed",
            BookingEvent::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Store this state.
    Apply(BookingState),
    /// The event is already reflected; nothing to write.
    Unchanged,
}

/// The event is not allowed in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    pub from: BookingState,
    pub event: BookingEvent,
}

/// Status implied by the join of provider confirmation and payment.
fn joined_status(provider_confirmed: bool, payment_status: PaymentStatus) -> BookingStatus {
    if provider_confirmed && payment_status.is_settled() {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    }
}

pub fn apply(state: BookingState, event: BookingEvent) -> Result<Transition, Rejected> {
    use BookingEvent as E;
    use BookingStatus as S;
    use PaymentStatus as P;

    let reject = Err(Rejected { from: state, event });

    if state.status.is_terminal() {
        // Repeats of the event that ended the booking are harmless.
        return match (state.status, event) {
            (S::Canceled, E::ProviderCanceled)
            | (S::Canceled, E::PaymentFailed)
            | (S::NoShow, E::ProviderNoShow)
            | (S::Completed, E::Completed) => Ok(Transition::Unchanged),
            _ => reject,
        };
    }

    let next = match event {
        E::ProviderConfirmed => {
            if state.provider_confirmed {
                return Ok(Transition::Unchanged);
            }
            BookingState {
                status: joined_status(true, state.payment_status),
                provider_confirmed: true,
                ..state
            }
        }
        E::PaymentSucceeded => match state.payment_status {
            P::Paid => return Ok(Transition::Unchanged),
            P::AwaitingPayment => BookingState {
                status: joined_status(state.provider_confirmed, P::Paid),
                payment_status: P::Paid,
                ..state
            },
            P::NotRequired | P::Failed => return reject,
        },
        E::PaymentFailed => match state.payment_status {
            P::AwaitingPayment => BookingState {
                status: S::Canceled,
                payment_status: P::Failed,
                ..state
            },
            P::NotRequired | P::Paid | P::Failed => return reject,
        },
        E::ProviderCanceled => BookingState {
            status: S::Canceled,
            ..state
        },
        E::ProviderNoShow => BookingState {
            status: S::NoShow,
            ..state
        },
        E::Completed => {
            if state.status != S::Confirmed {
                return reject;
            }
            BookingState {
                status: S::Completed,
                ..state
            }
        }
    };
    Ok(Transition::Apply(next))
}

/// Correlation data stored alongside a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correlation {
    pub payment_reference: Option<String>,
    pub provider_event_uri: Option<String>,
    pub provider_invitee_uri: Option<String>,
}

/// The compare-and-swap update for `event`, or `None` when nothing changes.
pub fn plan_update(
    booking: &Booking,
    event: BookingEvent,
    correlation: &Correlation,
) -> Result<Option<BookingUpdate>, BookingError> {
    let expected = booking.state();
    match apply(expected, event) {
        Ok(Transition::Unchanged) => Ok(None),
        Ok(Transition::Apply(next)) => Ok(Some(BookingUpdate {
            booking_id: booking.id.clone(),
            expected,
            next,
            payment_reference: correlation.payment_reference.clone(),
            provider_event_uri: correlation.provider_event_uri.clone(),
            provider_invitee_uri: correlation.provider_invitee_uri.clone(),
        })),
        Err(rejected) => Err(BookingError::InvalidTransition {
            booking_id: booking.id.clone(),
            from: rejected.from.status,
            event: rejected.event.to_string(),
        }),
    }
}
