//! Test fixtures for the booking flow tests
//!
//! A scriptable provider, a payment collaborator fake, and an in-memory harness
//! wiring the booking core exactly as the backend does.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use slotsync_booking::models::{ClientDetails, ConfirmBookingRequest, SlotSelection};
use slotsync_booking::{BookingApiState, SharedPaymentService, SigningSecretManager};
use slotsync_common::services::{BoxFuture, BoxedError, PaymentHandle, PaymentRequest, PaymentService};
use slotsync_common::signature::sign_payload;
use slotsync_config::{BookingConfig, WebhookConfig};
use slotsync_db::{InMemoryStore, Repositories, SessionType};
use slotsync_provider::{
    EventType, ProviderAccount, ProviderClient, ProviderError, TimeSlot, WebhookSubscription,
    WebhookSubscriptionRequest,
};

pub const SIGNING_KEY: &str = "provider-signing-key";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test";
pub const ADMIN_SECRET: &str = "admin-secret";
pub const PAID: &str = "st-consult-60";
pub const FREE: &str = "st-intro-15";
pub const PAID_EVENT_TYPE_URI: &str = "https://api.calendly.com/event_types/ET-CONSULT";
pub const FREE_EVENT_TYPE_URI: &str = "https://api.calendly.com/event_types/ET-INTRO";

/// Monday 2030-06-03, 00:00 UTC.
pub fn week_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 3, 0, 0, 0).unwrap()
}

pub fn slot_at(start: DateTime<Utc>, minutes: i64) -> TimeSlot {
    TimeSlot {
        start_time: start,
        end_time: start + Duration::minutes(minutes),
        scheduling_handle: format!("https://calendly.com/builder/consult/{}", start.timestamp()),
        remaining_capacity: 1,
    }
}

/// One-hour slots at 09:00 and 14:00 on each of the seven days.
pub fn week_of_slots() -> Vec<TimeSlot> {
    (0..7)
        .flat_map(|day| {
            let date = week_start() + Duration::days(day);
            [
                slot_at(date + Duration::hours(9), 60),
                slot_at(date + Duration::hours(14), 60),
            ]
        })
        .collect()
}

/// Provider whose availability can be changed between calls.
pub struct FakeProvider {
    slots: Mutex<Vec<TimeSlot>>,
}

impl FakeProvider {
    pub fn with_slots(slots: Vec<TimeSlot>) -> Self {
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Simulates another invitee taking the slot on the provider side.
    pub fn take_slot(&self, start: DateTime<Utc>) {
        self.slots.lock().unwrap().retain(|s| s.start_time != start);
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn get_current_account(&self) -> Result<ProviderAccount, ProviderError> {
        Ok(ProviderAccount {
            uri: "https://api.calendly.com/users/U1".into(),
            name: "Builder".into(),
            scheduling_url: "https://calendly.com/builder".into(),
            organization_uri: Some("https://api.calendly.com/organizations/O1".into()),
        })
    }

    async fn list_event_types(&self) -> Result<Vec<EventType>, ProviderError> {
        Ok(vec![EventType {
            id: "ET-CONSULT".into(),
            uri: PAID_EVENT_TYPE_URI.into(),
            slug: Some("consult".into()),
            name: "60-minute consultation".into(),
            duration_minutes: 60,
            active: true,
            scheduling_url: Some("https://calendly.com/builder/consult".into()),
        }])
    }

    async fn get_available_times(
        &self,
        _event_type_uri: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, ProviderError> {
        Ok(self
            .slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.start_time >= start && s.start_time <= end)
            .cloned()
            .collect())
    }

    async fn create_webhook_subscription(
        &self,
        request: WebhookSubscriptionRequest,
    ) -> Result<WebhookSubscription, ProviderError> {
        Ok(WebhookSubscription {
            uri: "https://api.calendly.com/webhook_subscriptions/W1".into(),
            callback_url: request.url,
            events: request.events,
            state: Some("active".into()),
            scope: Some(request.scope),
        })
    }
}

/// Payment collaborator that hands out a checkout session per request, or fails.
pub struct FakePayments {
    fail: bool,
    pub requests: Mutex<Vec<PaymentRequest>>,
}

impl FakePayments {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl PaymentService for FakePayments {
    type Error = BoxedError;

    fn initiate_payment(&self, request: PaymentRequest) -> BoxFuture<'_, PaymentHandle, BoxedError> {
        Box::pin(async move {
            if self.fail {
                return Err(BoxedError("card processor unreachable".into()));
            }
            let reference = format!("cs_test_{}", request.booking_id);
            self.requests.lock().unwrap().push(request);
            Ok(PaymentHandle {
                checkout_url: Some(format!("https://checkout.stripe.com/c/pay/{}", reference)),
                reference,
                processor: "stripe".into(),
            })
        })
    }
}

pub fn session_type(id: &str, title: &str, price_minor: i64) -> SessionType {
    SessionType {
        id: id.into(),
        builder_id: "builder-1".into(),
        title: title.into(),
        duration_minutes: 60,
        price_minor,
        currency: "usd".into(),
        is_active: true,
        requires_auth: false,
    }
}

pub struct Harness {
    pub memory: InMemoryStore,
    pub provider: Arc<FakeProvider>,
    pub payments: Arc<FakePayments>,
    pub state: Arc<BookingApiState>,
}

/// A paid ($150) and a free session type, both mapped, over a week of slots.
pub async fn harness(payments_fail: bool) -> Harness {
    harness_with(payments_fail, BookingConfig::default()).await
}

pub async fn harness_with(payments_fail: bool, booking_config: BookingConfig) -> Harness {
    let memory = InMemoryStore::new();
    let session_types = memory.session_types();
    session_types
        .upsert(session_type(PAID, "60-minute consultation", 15000))
        .await
        .unwrap();
    session_types
        .upsert(session_type(FREE, "Intro call", 0))
        .await
        .unwrap();
    let mappings = memory.event_mappings();
    mappings.upsert(PAID, "ET-CONSULT", PAID_EVENT_TYPE_URI).await.unwrap();
    mappings.upsert(FREE, "ET-INTRO", FREE_EVENT_TYPE_URI).await.unwrap();

    let provider = Arc::new(FakeProvider::with_slots(week_of_slots()));
    let payments = Arc::new(FakePayments::new(payments_fail));
    let shared_payments: SharedPaymentService = payments.clone();

    let state = BookingApiState::new(
        Repositories::in_memory(&memory),
        provider.clone(),
        Some(shared_payments),
        Arc::new(SigningSecretManager::new(Some(SIGNING_KEY.to_string()))),
        WebhookConfig {
            callback_url: "https://slotsync.example.com/api/booking/webhook".into(),
            ..WebhookConfig::default()
        },
        booking_config,
    );
    #[cfg(feature = "stripe")]
    let state = state.with_stripe_webhook_secret(Some(STRIPE_WEBHOOK_SECRET.to_string()));

    Harness {
        memory,
        provider,
        payments,
        state: Arc::new(state),
    }
}

pub fn confirm_request(session_type_id: &str, slot: &TimeSlot) -> ConfirmBookingRequest {
    ConfirmBookingRequest {
        session_type_id: session_type_id.into(),
        time_slot: SlotSelection {
            start_time: slot.start_time,
            end_time: slot.end_time,
            scheduling_handle: Some(slot.scheduling_handle.clone()),
        },
        client_details: ClientDetails {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            timezone: "Europe/London".into(),
        },
        notes: Some("First session".into()),
    }
}

/// Provider notification body for an invitee of the given event type.
pub fn invitee_event(
    kind: &str,
    invitee_id: &str,
    event_type_uri: &str,
    start: DateTime<Utc>,
    booking_id: Option<&str>,
) -> Vec<u8> {
    let event_uri = format!("https://api.calendly.com/scheduled_events/EV-{}", invitee_id);
    let body: Value = json!({
        "event": kind,
        "created_at": "2030-06-01T08:00:00Z",
        "payload": {
            "uri": format!("{}/invitees/{}", event_uri, invitee_id),
            "email": "ada@example.com",
            "event": event_uri,
            "scheduled_event": {
                "uri": event_uri,
                "start_time": start,
                "event_type": event_type_uri
            },
            "tracking": { "utm_content": booking_id },
            "rescheduled": false
        }
    });
    body.to_string().into_bytes()
}

pub fn sign(body: &[u8]) -> String {
    sign_payload(SIGNING_KEY, Utc::now().timestamp(), body)
}
