//! Booking core for slotsync
//!
//! Live availability from the scheduling provider, slot reservation with a
//! two-phase confirmation (provider confirmation joined with payment), signed
//! webhook ingestion with durable idempotence, and reconciliation of deferred
//! events. The axum routes in [`routes`] expose all of it.

pub mod auth;
pub mod availability;
pub mod doc;
pub mod error;
pub mod handlers;
pub mod mapping;
pub mod models;
pub mod orchestrator;
pub mod provisioning;
pub mod reconcile;
pub mod routes;
#[cfg(test)]
mod routes_test;
pub mod signing;
#[cfg(feature = "stripe")]
pub mod stripe_webhook;
#[cfg(test)]
mod test_support;
pub mod transitions;
#[cfg(test)]
mod transitions_proptest;
pub mod webhook;

pub use availability::AvailabilityService;
pub use error::BookingError;
pub use handlers::BookingApiState;
pub use mapping::EventMappingStore;
pub use orchestrator::{BookingOrchestrator, SharedPaymentService};
pub use provisioning::SubscriptionProvisioner;
pub use reconcile::Reconciler;
pub use signing::SigningSecretManager;
pub use transitions::BookingEvent;
pub use webhook::{PaymentOutcome, WebhookOutcome, WebhookProcessor};
