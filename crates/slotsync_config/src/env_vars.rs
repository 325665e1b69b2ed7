//! Environment variable handling for slotsync.
//!
//! Non-secret settings use the `SLOTSYNC__SECTION__KEY` pattern and are picked up
//! by the config builder. Secrets are only ever read from the environment, using
//! `SLOTSYNC_SECRET_SECTION_KEY` with a fallback to the legacy `SECTION_KEY` name.

use std::env;

/// The default prefix for configuration environment variables
pub const DEFAULT_PREFIX: &str = "SLOTSYNC";

/// The prefix for secret environment variables
pub const SECRET_PREFIX: &str = "SLOTSYNC_SECRET";

/// The separator for configuration environment variables
pub const CONFIG_SEPARATOR: &str = "__";

/// The separator for secret environment variables
pub const SECRET_SEPARATOR: &str = "_";

pub const PROVIDER_API_TOKEN: &str = "provider.api_token";
pub const WEBHOOK_SIGNING_KEY: &str = "webhook.signing_key";
pub const STRIPE_SECRET_KEY: &str = "stripe.secret_key";
pub const STRIPE_WEBHOOK_SECRET: &str = "stripe.webhook_secret";
pub const ADMIN_SHARED_SECRET: &str = "admin.shared_secret";

/// Get the prefix for configuration environment variables
pub fn get_config_prefix() -> String {
    env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}

/// `"server.host"` -> `"SLOTSYNC__SERVER__HOST"`
pub fn config_path_to_env_var(path: &str) -> String {
    let prefix = get_config_prefix();
    let path = path.replace('.', CONFIG_SEPARATOR);
    format!("{}{}{}", prefix, CONFIG_SEPARATOR, path).to_uppercase()
}

/// `"provider.api_token"` -> `"SLOTSYNC_SECRET_PROVIDER_API_TOKEN"`
pub fn secret_path_to_env_var(path: &str) -> String {
    let path = path.replace('.', SECRET_SEPARATOR);
    format!("{}{}{}", SECRET_PREFIX, SECRET_SEPARATOR, path).to_uppercase()
}

/// `"provider.api_token"` -> `"PROVIDER_API_TOKEN"`
pub fn legacy_secret_path_to_env_var(path: &str) -> String {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() < 2 {
        return path.to_uppercase();
    }

    let service = parts[0];
    let key = parts[1..].join(SECRET_SEPARATOR);
    format!("{}_{}", service, key).to_uppercase()
}

/// Reads a secret, trying the prefixed name first and the legacy name second.
/// Empty values count as missing.
pub fn get_secret_env_var(path: &str) -> Option<String> {
    let lookup = |name: String| env::var(name).ok().filter(|v| !v.trim().is_empty());
    lookup(secret_path_to_env_var(path)).or_else(|| lookup(legacy_secret_path_to_env_var(path)))
}
