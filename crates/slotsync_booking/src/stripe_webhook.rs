//! Stripe payment webhook feeding the two-phase join.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::json;
use slotsync_common::logging::SECURITY_TARGET;
use slotsync_stripe::{
    parse_event, parse_payment_notification, verify_stripe_signature,
    DEFAULT_SIGNATURE_TOLERANCE_SECS,
};
use tracing::{debug, error, info, warn};

use crate::error::BookingError;
use crate::handlers::BookingApiState;
use crate::webhook::PaymentOutcome;

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/stripe/webhook",
    request_body(content = String, description = "Raw Stripe event", content_type = "application/json"),
    responses(
        (status = 200, description = "Event stored or ignored", body = crate::webhook::WebhookOutcome),
        (status = 400, description = "Unreadable event"),
        (status = 401, description = "Signature missing or invalid"),
        (status = 500, description = "Webhook secret not configured")
    ),
    tag = "Booking Webhooks"
))]
pub async fn stripe_webhook_handler(
    State(state): State<Arc<BookingApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(secret) = state.stripe_webhook_secret.as_deref() else {
        error!("Stripe webhook secret not configured; refusing payment webhook");
        return BookingError::Configuration("Stripe webhook secret not configured".to_string())
            .into_response();
    };

    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = verify_stripe_signature(
        &body,
        signature,
        secret,
        DEFAULT_SIGNATURE_TOLERANCE_SECS,
        Utc::now().timestamp(),
    ) {
        warn!(target: SECURITY_TARGET, "Discarding Stripe webhook: {}", e);
        return BookingError::SignatureInvalid(e.to_string()).into_response();
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => return BookingError::MalformedPayload(e.to_string()).into_response(),
    };

    let Some(notification) = parse_payment_notification(&event) else {
        debug!("Stripe event {} ({}) carries no payment outcome", event.id, event.event_type);
        return (
            StatusCode::OK,
            Json(json!({ "outcome": "ignored", "event_kind": event.event_type })),
        )
            .into_response();
    };
    info!(
        "Stripe reports payment {} for booking {}",
        if notification.succeeded { "success" } else { "failure" },
        notification.booking_id
    );

    let outcome = PaymentOutcome {
        booking_id: notification.booking_id,
        succeeded: notification.succeeded,
        reference: Some(notification.reference),
    };
    match state
        .webhooks
        .handle_payment_notification(&notification.event_id, &notification.event_type, outcome)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}
