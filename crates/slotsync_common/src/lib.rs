// --- File: crates/slotsync_common/src/lib.rs ---

pub mod error; // Error handling
pub mod features; // Feature flag handling
pub mod http; // HTTP utilities
pub mod logging; // Logging utilities
pub mod services; // Collaborator abstractions
pub mod signature; // Webhook signatures
#[cfg(test)]
mod signature_proptest;

pub use error::{external_service_error, HttpStatusCode, SlotsyncError};

pub use http::client::create_client;

pub use logging::{init, init_with_level};

pub use features::{is_feature_enabled, is_provider_enabled};

#[cfg(feature = "stripe")]
pub use features::is_stripe_enabled;
