use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use slotsync_config::{BookingConfig, WebhookConfig};
use slotsync_db::{Booking, EventMapping, Repositories};
use slotsync_provider::{EventType, ProviderClient};
use tracing::{debug, info};

use crate::availability::AvailabilityService;
use crate::error::BookingError;
use crate::mapping::EventMappingStore;
use crate::models::{
    AvailabilityRequest, AvailabilityResponse, ConfirmBookingRequest, ConfirmBookingResponse,
    LinkMappingRequest, PaymentOutcomeRequest, ProvisionSubscriptionRequest,
    ProvisionSubscriptionResponse, ReconcileReport, SlotView,
};
use crate::orchestrator::{BookingOrchestrator, SharedPaymentService};
use crate::provisioning::SubscriptionProvisioner;
use crate::reconcile::Reconciler;
use crate::signing::SigningSecretManager;
use crate::webhook::WebhookProcessor;

/// Everything the booking routes need, wired once at startup.
pub struct BookingApiState {
    pub orchestrator: Arc<BookingOrchestrator>,
    pub availability: Arc<AvailabilityService>,
    pub mappings: Arc<EventMappingStore>,
    pub webhooks: Arc<WebhookProcessor>,
    pub provisioner: Arc<SubscriptionProvisioner>,
    pub reconciler: Arc<Reconciler>,
    /// Header carrying the provider's webhook signature.
    pub signature_header: String,
    /// Verifies `Stripe-Signature`; payment webhooks are refused without it.
    #[cfg(feature = "stripe")]
    pub stripe_webhook_secret: Option<String>,
}

impl BookingApiState {
    pub fn new(
        repos: Repositories,
        provider: Arc<dyn ProviderClient>,
        payments: Option<SharedPaymentService>,
        secrets: Arc<SigningSecretManager>,
        webhook_config: WebhookConfig,
        booking_config: BookingConfig,
    ) -> Self {
        let mappings = Arc::new(EventMappingStore::new(
            repos.event_mappings.clone(),
            repos.session_types.clone(),
            provider.clone(),
        ));
        let availability = Arc::new(AvailabilityService::new(
            repos.session_types.clone(),
            mappings.clone(),
            provider.clone(),
        ));
        let orchestrator = Arc::new(BookingOrchestrator::new(
            repos.bookings.clone(),
            availability.clone(),
            payments,
        ));
        let webhooks = Arc::new(WebhookProcessor::new(
            repos.clone(),
            secrets.clone(),
            webhook_config.signature_tolerance_secs,
        ));
        let reconciler = Arc::new(Reconciler::new(repos, webhooks.clone(), booking_config));
        let signature_header = webhook_config.signature_header.clone();
        let provisioner = Arc::new(SubscriptionProvisioner::new(provider, secrets, webhook_config));

        Self {
            orchestrator,
            availability,
            mappings,
            webhooks,
            provisioner,
            reconciler,
            signature_header,
            #[cfg(feature = "stripe")]
            stripe_webhook_secret: None,
        }
    }

    #[cfg(feature = "stripe")]
    pub fn with_stripe_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.stripe_webhook_secret = secret.filter(|s| !s.is_empty());
        self
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/booking/availability",
    request_body = AvailabilityRequest,
    responses(
        (status = 200, description = "Bookable slots inside the window", body = AvailabilityResponse),
        (status = 400, description = "Invalid date range"),
        (status = 422, description = "Session type inactive or not mapped to a provider event type"),
        (status = 503, description = "Provider unavailable, try again")
    ),
    tag = "Booking"
))]
pub async fn availability_handler(
    State(state): State<Arc<BookingApiState>>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, BookingError> {
    let (start, end) = request.window()?;
    let slots = state
        .availability
        .get_availability(&request.session_type_id, start, end)
        .await?;
    Ok(Json(AvailabilityResponse {
        time_slots: slots.into_iter().map(SlotView::from).collect(),
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/booking/confirm",
    request_body = ConfirmBookingRequest,
    responses(
        (status = 200, description = "Slot reserved; booking pending", body = ConfirmBookingResponse),
        (status = 402, description = "Payment could not be initiated; booking canceled"),
        (status = 409, description = "Slot gone or taken concurrently, re-query availability")
    ),
    tag = "Booking"
))]
pub async fn confirm_booking_handler(
    State(state): State<Arc<BookingApiState>>,
    Json(request): Json<ConfirmBookingRequest>,
) -> Result<Json<ConfirmBookingResponse>, BookingError> {
    let response = state.orchestrator.confirm_booking(request).await?;
    Ok(Json(response))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/booking/bookings/{id}",
    params(("id" = String, Path, description = "Booking id")),
    responses(
        (status = 200, description = "The booking", body = Booking),
        (status = 404, description = "Unknown booking")
    ),
    tag = "Booking"
))]
pub async fn get_booking_handler(
    State(state): State<Arc<BookingApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(state.orchestrator.get_booking(&id).await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/booking/bookings/{id}/payment",
    params(("id" = String, Path, description = "Booking id")),
    request_body = PaymentOutcomeRequest,
    responses(
        (status = 200, description = "Booking after the payment result", body = Booking),
        (status = 401, description = "Missing or invalid admin secret"),
        (status = 409, description = "Payment result not applicable in the booking's state")
    ),
    tag = "Booking Admin"
))]
pub async fn payment_outcome_handler(
    State(state): State<Arc<BookingApiState>>,
    Path(id): Path<String>,
    Json(request): Json<PaymentOutcomeRequest>,
) -> Result<Json<Booking>, BookingError> {
    let booking = state
        .orchestrator
        .record_payment_outcome(&id, request.succeeded, request.reference)
        .await?;
    Ok(Json(booking))
}

/// Provider webhook. Answers 200 once the delivery is stored, whatever the
/// processing result, so transient local failures do not trigger redelivery storms.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/booking/webhook",
    request_body(content = String, description = "Raw provider notification", content_type = "application/json"),
    responses(
        (status = 200, description = "Delivery stored", body = crate::webhook::WebhookOutcome),
        (status = 400, description = "Unreadable payload"),
        (status = 401, description = "Signature missing or invalid")
    ),
    tag = "Booking Webhooks"
))]
pub async fn provider_webhook_handler(
    State(state): State<Arc<BookingApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(state.signature_header.as_str())
        .and_then(|value| value.to_str().ok());
    match state.webhooks.handle_webhook(&body, signature).await {
        Ok(outcome) => {
            debug!("Provider webhook acknowledged: {:?}", outcome);
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/booking/mappings/{session_type_id}",
    params(("session_type_id" = String, Path, description = "Session type id")),
    responses(
        (status = 200, description = "Current mapping", body = EventMapping),
        (status = 422, description = "Session type not mapped")
    ),
    tag = "Booking"
))]
pub async fn get_mapping_handler(
    State(state): State<Arc<BookingApiState>>,
    Path(session_type_id): Path<String>,
) -> Result<Json<EventMapping>, BookingError> {
    Ok(Json(state.mappings.resolve(&session_type_id).await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/booking/mappings/{session_type_id}",
    params(("session_type_id" = String, Path, description = "Session type id")),
    request_body = LinkMappingRequest,
    responses(
        (status = 200, description = "Mapping stored", body = EventMapping),
        (status = 401, description = "Missing or invalid admin secret"),
        (status = 422, description = "Unknown or inactive provider event type")
    ),
    tag = "Booking Admin"
))]
pub async fn put_mapping_handler(
    State(state): State<Arc<BookingApiState>>,
    Path(session_type_id): Path<String>,
    Json(request): Json<LinkMappingRequest>,
) -> Result<Json<EventMapping>, BookingError> {
    let mapping = state
        .mappings
        .link_session_type(&session_type_id, &request.provider_event_type_id)
        .await?;
    Ok(Json(mapping))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/booking/provider/event-types",
    responses(
        (status = 200, description = "Event types of the provider account", body = Vec<EventType>),
        (status = 401, description = "Missing or invalid admin secret"),
        (status = 503, description = "Provider unavailable")
    ),
    tag = "Booking Admin"
))]
pub async fn list_event_types_handler(
    State(state): State<Arc<BookingApiState>>,
) -> Result<Json<Vec<EventType>>, BookingError> {
    Ok(Json(state.mappings.discover().await?))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/booking/webhook-subscriptions",
    request_body = ProvisionSubscriptionRequest,
    responses(
        (status = 200, description = "Subscription registered; signing key rotated", body = ProvisionSubscriptionResponse),
        (status = 401, description = "Missing or invalid admin secret"),
        (status = 500, description = "No callback URL configured")
    ),
    tag = "Booking Admin"
))]
pub async fn provision_subscription_handler(
    State(state): State<Arc<BookingApiState>>,
    Json(request): Json<ProvisionSubscriptionRequest>,
) -> Result<Json<ProvisionSubscriptionResponse>, BookingError> {
    let response = state.provisioner.provision(request).await?;
    info!("Provisioned webhook subscription {}", response.subscription.uri);
    Ok(Json(response))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/booking/reconcile",
    responses(
        (status = 200, description = "Reconciliation summary", body = ReconcileReport),
        (status = 401, description = "Missing or invalid admin secret")
    ),
    tag = "Booking Admin"
))]
pub async fn reconcile_handler(
    State(state): State<Arc<BookingApiState>>,
) -> Result<Json<ReconcileReport>, BookingError> {
    Ok(Json(state.reconciler.reconcile().await?))
}
