use crate::auth::{admin_auth_middleware, AdminAuthState};
use crate::handlers::{
    availability_handler, confirm_booking_handler, get_booking_handler, get_mapping_handler,
    list_event_types_handler, payment_outcome_handler, provider_webhook_handler,
    provision_subscription_handler, put_mapping_handler, reconcile_handler, BookingApiState,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tracing::info;

/// Creates the router for all booking routes, relative to `/api`.
///
/// Administrative routes (including the PUT on a mapping) sit behind the
/// `X-Admin-Secret` check; the webhook routes authenticate through their
/// signatures instead.
pub fn routes(state: Arc<BookingApiState>, admin_secret: Option<String>) -> Router {
    let auth_state = Arc::new(AdminAuthState {
        shared_secret: admin_secret,
    });

    let admin_router = Router::new()
        .route("/booking/bookings/{id}/payment", post(payment_outcome_handler))
        .route("/booking/mappings/{session_type_id}", put(put_mapping_handler))
        .route("/booking/provider/event-types", get(list_event_types_handler))
        .route(
            "/booking/webhook-subscriptions",
            post(provision_subscription_handler),
        )
        .route("/booking/reconcile", post(reconcile_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, admin_auth_middleware));

    #[allow(unused_mut)]
    let mut public_router = Router::new()
        .route("/booking/availability", post(availability_handler))
        .route("/booking/confirm", post(confirm_booking_handler))
        .route("/booking/bookings/{id}", get(get_booking_handler))
        .route("/booking/mappings/{session_type_id}", get(get_mapping_handler))
        .route("/booking/webhook", post(provider_webhook_handler));

    #[cfg(feature = "stripe")]
    {
        info!("💡 Booking: adding /stripe/webhook route.");
        public_router = public_router.route(
            "/stripe/webhook",
            post(crate::stripe_webhook::stripe_webhook_handler),
        );
    }

    info!("💡 Booking routes ready");
    public_router.merge(admin_router).with_state(state)
}
