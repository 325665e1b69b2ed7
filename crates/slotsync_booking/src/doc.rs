#![cfg(feature = "openapi")]
use utoipa::OpenApi;

use crate::models::{
    AvailabilityRequest, AvailabilityResponse, ClientDetails, ConfirmBookingRequest,
    ConfirmBookingResponse, LinkMappingRequest, PaymentOutcomeRequest,
    ProvisionSubscriptionRequest, ProvisionSubscriptionResponse, ReconcileReport, SlotSelection,
    SlotView,
};
use crate::webhook::WebhookOutcome;
use slotsync_common::services::PaymentHandle;
use slotsync_db::{Booking, BookingStatus, EventMapping, PaymentStatus};
use slotsync_provider::{EventType, WebhookSubscription};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::availability_handler,
        crate::handlers::confirm_booking_handler,
        crate::handlers::get_booking_handler,
        crate::handlers::payment_outcome_handler,
        crate::handlers::provider_webhook_handler,
        crate::handlers::get_mapping_handler,
        crate::handlers::put_mapping_handler,
        crate::handlers::list_event_types_handler,
        crate::handlers::provision_subscription_handler,
        crate::handlers::reconcile_handler
    ),
    components(
        schemas(
            AvailabilityRequest, AvailabilityResponse, SlotView,
            ConfirmBookingRequest, ConfirmBookingResponse, SlotSelection, ClientDetails,
            PaymentOutcomeRequest, PaymentHandle, LinkMappingRequest,
            ProvisionSubscriptionRequest, ProvisionSubscriptionResponse, WebhookSubscription,
            ReconcileReport, WebhookOutcome,
            Booking, BookingStatus, PaymentStatus, EventMapping, EventType
        )
    ),
    tags(
        (name = "Booking", description = "Availability and booking confirmation"),
        (name = "Booking Webhooks", description = "Signed provider and payment notifications"),
        (name = "Booking Admin", description = "Mappings, subscriptions and reconciliation (X-Admin-Secret)")
    )
)]
pub struct BookingApiDoc;

#[cfg(feature = "stripe")]
#[derive(OpenApi)]
#[openapi(paths(crate::stripe_webhook::stripe_webhook_handler))]
pub struct StripeWebhookApiDoc;
