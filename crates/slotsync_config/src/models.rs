// --- File: crates/slotsync_config/src/models.rs ---

use config::ConfigError;
use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Database Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite:data/slotsync.db, via SLOTSYNC__DATABASE__URL
}

// --- Scheduling Provider Config ---
// Holds non-secret provider config. The API token is loaded from env: PROVIDER_API_TOKEN
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub api_base_url: String,
    /// Per-request timeout; provider calls fail closed after this.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries for idempotent GETs on 429/5xx.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Largest window the provider accepts for one availability call.
    #[serde(default = "default_max_window_days")]
    pub max_window_days: i64,
    /// Most provider calls one availability request may fan out into; longer
    /// windows are refused.
    #[serde(default = "default_max_window_chunks")]
    pub max_window_chunks: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_provider_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_window_days: default_max_window_days(),
            max_window_chunks: default_max_window_chunks(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://api.calendly.com".to_string()
}
fn default_request_timeout_secs() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_max_window_days() -> i64 {
    7
}
fn default_max_window_chunks() -> usize {
    8
}

// --- Provider Webhook Config ---
// Signing key loaded from env: WEBHOOK_SIGNING_KEY
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebhookConfig {
    /// Public URL the provider posts notifications to.
    pub callback_url: String,
    #[serde(default = "default_webhook_events")]
    pub events: Vec<String>,
    #[serde(default = "default_signature_header")]
    pub signature_header: String,
    /// Maximum age of a signed timestamp; 0 disables the check.
    #[serde(default = "default_signature_tolerance_secs")]
    pub signature_tolerance_secs: i64,
    #[serde(default = "default_webhook_scope")]
    pub scope: String,
}

impl Default for WebhookConfig {
    /// Everything but the callback URL, which has no sensible default.
    fn default() -> Self {
        Self {
            callback_url: String::new(),
            events: default_webhook_events(),
            signature_header: default_signature_header(),
            signature_tolerance_secs: default_signature_tolerance_secs(),
            scope: default_webhook_scope(),
        }
    }
}

fn default_webhook_events() -> Vec<String> {
    vec![
        "invitee.created".to_string(),
        "invitee.canceled".to_string(),
        "invitee_no_show.created".to_string(),
    ]
}
fn default_signature_header() -> String {
    "Calendly-Webhook-Signature".to_string()
}
fn default_signature_tolerance_secs() -> i64 {
    300
}
fn default_webhook_scope() -> String {
    "user".to_string()
}

// --- Booking Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BookingConfig {
    /// Confirmed bookings are marked completed this long after their end time.
    #[serde(default = "default_completion_grace_hours")]
    pub completion_grace_hours: i64,
    /// Upper bound of stored webhook events retried per reconciliation run.
    #[serde(default = "default_reconcile_batch_size")]
    pub reconcile_batch_size: i64,
    /// Failed processing attempts after which a stored event is closed unapplied.
    #[serde(default = "default_reconcile_max_attempts")]
    pub reconcile_max_attempts: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            completion_grace_hours: default_completion_grace_hours(),
            reconcile_batch_size: default_reconcile_batch_size(),
            reconcile_max_attempts: default_reconcile_max_attempts(),
        }
    }
}

fn default_completion_grace_hours() -> i64 {
    24
}
fn default_reconcile_batch_size() -> i64 {
    50
}
fn default_reconcile_max_attempts() -> i64 {
    20
}

// --- Stripe Config ---
// Secret key loaded from env: STRIPE_SECRET_KEY, webhook secret from STRIPE_WEBHOOK_SECRET
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StripeConfig {
    pub success_url: String, // Mandatory
    pub cancel_url: String,  // Mandatory
    pub default_currency: Option<String>,
    #[serde(default = "default_stripe_api_base_url")]
    pub api_base_url: String,
}

fn default_stripe_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_provider: bool,
    #[serde(default)]
    pub use_stripe: bool,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub stripe: Option<StripeConfig>,
}

impl AppConfig {
    /// Rejects flag/section combinations that cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_provider && self.provider.is_none() {
            return Err(ConfigError::Message(
                "use_provider is set but the [provider] section is missing".to_string(),
            ));
        }
        if self.use_stripe && self.stripe.is_none() {
            return Err(ConfigError::Message(
                "use_stripe is set but the [stripe] section is missing".to_string(),
            ));
        }
        if let Some(provider) = &self.provider {
            if provider.max_window_days < 1 {
                return Err(ConfigError::Message(
                    "provider.max_window_days must be at least 1".to_string(),
                ));
            }
            if provider.max_window_chunks < 1 {
                return Err(ConfigError::Message(
                    "provider.max_window_chunks must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}
