//! Typed client for the external scheduling provider.
//!
//! Wraps the provider's HTTP API (Calendly v2 shape): account lookup, paginated
//! event types, availability with window splitting, webhook registration.
//! Idempotent GETs retry on 429/5xx with jittered exponential backoff; every
//! call runs under a request timeout and fails closed.

pub mod client;
pub mod error;
pub mod http;
pub mod models;
pub mod pages;
pub mod retry;
pub mod window;
#[cfg(test)]
mod window_proptest;

pub use client::ProviderClient;
pub use error::ProviderError;
pub use http::HttpProviderClient;
pub use models::{
    id_from_uri, EventType, ProviderAccount, TimeSlot, WebhookSubscription,
    WebhookSubscriptionRequest,
};
pub use pages::EventTypePages;
