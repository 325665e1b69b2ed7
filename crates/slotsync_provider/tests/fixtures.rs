//! Test fixtures for the provider client tests
//!
//! Builders for client configuration and provider API payloads.

#![allow(dead_code)]

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use slotsync_config::ProviderConfig;
use slotsync_provider::HttpProviderClient;

pub const TOKEN: &str = "test-token";

/// Config pointing at a mock server, with fast retries.
pub fn provider_config(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        api_base_url: base_url.to_string(),
        request_timeout_secs: 1,
        max_retries: 2,
        retry_base_delay_ms: 1,
        max_window_days: 7,
        max_window_chunks: 8,
    }
}

pub fn client(base_url: &str) -> HttpProviderClient {
    HttpProviderClient::new(&provider_config(base_url), TOKEN).expect("client should build")
}

pub fn user_body(base_url: &str) -> Value {
    json!({
        "resource": {
            "uri": format!("{}/users/U1", base_url),
            "name": "Test Builder",
            "scheduling_url": "https://calendly.com/test-builder",
            "current_organization": format!("{}/organizations/O1", base_url)
        }
    })
}

pub fn event_type_json(base_url: &str, id: &str, duration: i64, active: bool) -> Value {
    json!({
        "uri": format!("{}/event_types/{}", base_url, id),
        "name": format!("Session {}", id),
        "slug": format!("session-{}", id.to_lowercase()),
        "duration": duration,
        "active": active,
        "scheduling_url": format!("https://calendly.com/test-builder/{}", id)
    })
}

pub fn available_time_json(start: DateTime<Utc>, status: &str, remaining: i64) -> Value {
    json!({
        "status": status,
        "invitees_remaining": remaining,
        "start_time": start.to_rfc3339_opts(SecondsFormat::Secs, true),
        "scheduling_url": format!("https://calendly.com/test-builder/x/{}", start.timestamp())
    })
}
