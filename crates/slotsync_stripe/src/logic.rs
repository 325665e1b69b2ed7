use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use slotsync_common::services::PaymentRequest;
use slotsync_common::signature::verify_signature;
use slotsync_config::StripeConfig;
use tracing::{debug, info, warn};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::StripeError;

/// Metadata key carrying the local booking id on sessions and payment intents.
pub const BOOKING_ID_METADATA_KEY: &str = "booking_id";

/// Default tolerance for the `t=` component of `Stripe-Signature`.
pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

// --- Data Structures ---

#[derive(Deserialize, Debug)]
struct StripeCheckoutSessionApiResponse {
    pub id: String,
    pub url: Option<String>,
}

/// A created Checkout Session.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CheckoutSession {
    #[cfg_attr(feature = "openapi", schema(example = "cs_test_a1..."))]
    pub session_id: String,
    #[cfg_attr(
        feature = "openapi",
        schema(example = "https://checkout.stripe.com/pay/cs_test_a1...")
    )]
    pub url: String,
}

/// Represents the `data` field within a Stripe Event.
#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StripeEventData {
    /// The object the event is about; its shape depends on the event type.
    pub object: serde_json::Value,
}

/// Represents the outer Stripe Event object.
#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StripeEvent {
    pub id: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub livemode: bool,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

/// The `data.object` of `checkout.session.*` events.
#[derive(Deserialize, Debug, Clone)]
pub struct StripeCheckoutSessionObject {
    pub id: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub payment_intent: Option<String>,
    /// e.g. "paid", "unpaid", "no_payment_required"
    pub payment_status: Option<String>,
    /// e.g. "open", "complete", "expired"
    pub status: Option<String>,
    pub client_reference_id: Option<String>,
}

/// A payment outcome extracted from a Stripe event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub event_id: String,
    pub event_type: String,
    pub booking_id: String,
    pub succeeded: bool,
    /// Checkout session id.
    pub reference: String,
}

// --- Checkout ---

/// Creates a Checkout Session charging `request.amount_minor` for one booking.
///
/// The booking id travels as `client_reference_id` and as metadata on both the
/// session and its payment intent, so every outcome event can be correlated.
pub async fn create_checkout_session(
    client: &Client,
    stripe_config: &StripeConfig,
    secret_key: &str,
    request: &PaymentRequest,
) -> Result<CheckoutSession, StripeError> {
    if request.amount_minor <= 0 {
        return Err(StripeError::InvalidRequest(format!(
            "amount must be positive, got {}",
            request.amount_minor
        )));
    }

    let currency = if request.currency.trim().is_empty() {
        stripe_config
            .default_currency
            .clone()
            .ok_or_else(|| StripeError::InvalidRequest("no currency given".to_string()))?
    } else {
        request.currency.clone()
    }
    .to_lowercase();

    let mut form_body: Vec<(String, String)> = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), stripe_config.success_url.clone()),
        ("cancel_url".to_string(), stripe_config.cancel_url.clone()),
        ("line_items[0][price_data][currency]".to_string(), currency),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            request.description.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            request.amount_minor.to_string(),
        ),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("client_reference_id".to_string(), request.booking_id.clone()),
        (
            format!("metadata[{}]", BOOKING_ID_METADATA_KEY),
            request.booking_id.clone(),
        ),
        (
            format!("payment_intent_data[metadata][{}]", BOOKING_ID_METADATA_KEY),
            request.booking_id.clone(),
        ),
    ];
    if let Some(email) = &request.customer_email {
        form_body.push(("customer_email".to_string(), email.clone()));
    }

    let api_url = format!(
        "{}/v1/checkout/sessions",
        stripe_config.api_base_url.trim_end_matches('/')
    );
    debug!("[Stripe Logic] Creating checkout session for booking {}", request.booking_id);

    let response = client
        .post(&api_url)
        .basic_auth(secret_key, None::<&str>)
        .form(&form_body)
        .send()
        .await?;

    let status = response.status();
    let body_text = response.text().await?;

    if !status.is_success() {
        let error_message = match serde_json::from_str::<serde_json::Value>(&body_text) {
            Ok(json_body) => json_body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or(&body_text)
                .to_string(),
            Err(_) => body_text,
        };
        warn!(
            "[Stripe Logic] Checkout session creation failed with HTTP status {}: {}",
            status, error_message
        );
        return Err(StripeError::ApiError {
            status_code: status.as_u16(),
            message: error_message,
        });
    }

    let created: StripeCheckoutSessionApiResponse = serde_json::from_str(&body_text)?;
    let url = created.url.ok_or_else(|| StripeError::ApiError {
        status_code: status.as_u16(),
        message: "Stripe response missing checkout URL".to_string(),
    })?;
    info!(
        "[Stripe Logic] Checkout session {} created for booking {}",
        created.id, request.booking_id
    );
    Ok(CheckoutSession {
        session_id: created.id,
        url,
    })
}

// --- Webhook Processing Logic ---

/// Verifies the `Stripe-Signature` header of an incoming webhook.
pub fn verify_stripe_signature(
    payload_bytes: &[u8],
    sig_header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), StripeError> {
    verify_signature(payload_bytes, sig_header, &[secret], tolerance_secs, now_unix)?;
    Ok(())
}

/// Parses a verified webhook body.
pub fn parse_event(payload_bytes: &[u8]) -> Result<StripeEvent, StripeError> {
    Ok(serde_json::from_slice(payload_bytes)?)
}

fn booking_id_from(
    metadata: Option<&HashMap<String, String>>,
    client_reference_id: Option<&String>,
) -> Option<String> {
    client_reference_id
        .or_else(|| metadata.and_then(|m| m.get(BOOKING_ID_METADATA_KEY)))
        .filter(|id| !id.is_empty())
        .cloned()
}

/// Extracts the payment outcome from an event, if the event carries one.
///
/// `checkout.session.completed` only counts as success once Stripe reports the
/// session paid; delayed payment methods report later through
/// `checkout.session.async_payment_succeeded`. Only the end of the session is a
/// failure: a declined card (`payment_intent.payment_failed`) can still be
/// retried inside the same session.
pub fn parse_payment_notification(event: &StripeEvent) -> Option<PaymentNotification> {
    let outcome = |booking_id: String, succeeded: bool, reference: String| PaymentNotification {
        event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        booking_id,
        succeeded,
        reference,
    };

    match event.event_type.as_str() {
        "checkout.session.completed"
        | "checkout.session.async_payment_succeeded"
        | "checkout.session.async_payment_failed"
        | "checkout.session.expired" => {
            let session: StripeCheckoutSessionObject =
                serde_json::from_value(event.data.object.clone()).ok()?;
            let succeeded = match event.event_type.as_str() {
                "checkout.session.completed" => {
                    if session.payment_status.as_deref() != Some("paid") {
                        debug!(
                            "Checkout session {} completed with payment status {:?}, waiting for async outcome",
                            session.id, session.payment_status
                        );
                        return None;
                    }
                    true
                }
                "checkout.session.async_payment_succeeded" => true,
                _ => false,
            };
            let booking_id =
                booking_id_from(session.metadata.as_ref(), session.client_reference_id.as_ref())?;
            Some(outcome(booking_id, succeeded, session.id))
        }
        _ => None,
    }
}
