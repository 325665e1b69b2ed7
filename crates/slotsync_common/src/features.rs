//! Runtime feature checks.
//!
//! Features are switched twice: at compile time through cargo features on the
//! backend crate, and at runtime through `use_*` flags plus the presence of the
//! matching config section. Both must agree for a feature to be mounted.

use slotsync_config::AppConfig;

/// `true` when the runtime flag is set and the config section is present.
pub fn is_feature_enabled<T>(use_feature: bool, feature_config: Option<&T>) -> bool {
    use_feature && feature_config.is_some()
}

/// Provider-backed availability and booking.
pub fn is_provider_enabled(config: &AppConfig) -> bool {
    is_feature_enabled(config.use_provider, config.provider.as_ref())
}

/// Stripe payment collection.
#[cfg(feature = "stripe")]
pub fn is_stripe_enabled(config: &AppConfig) -> bool {
    is_feature_enabled(config.use_stripe, config.stripe.as_ref())
}
