//! Provider-agnostic records produced by the client, plus the Calendly v2 wire
//! shapes they are decoded from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The account the API token belongs to.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderAccount {
    pub uri: String,
    pub name: String,
    /// Base URL invitees use to schedule with this account.
    pub scheduling_url: String,
    pub organization_uri: Option<String>,
}

/// A bookable meeting template on the provider side.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventType {
    /// Provider-assigned id, the last path segment of `uri`.
    pub id: String,
    pub uri: String,
    pub slug: Option<String>,
    pub name: String,
    pub duration_minutes: i64,
    pub active: bool,
    pub scheduling_url: Option<String>,
}

/// A concrete bookable window. Never cached: it can go stale at any moment.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Opaque provider handle used to book this exact slot.
    pub scheduling_handle: String,
    pub remaining_capacity: i64,
}

/// Registration of a webhook callback with the provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookSubscriptionRequest {
    pub url: String,
    pub events: Vec<String>,
    pub organization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub scope: String,
    pub signing_key: String,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookSubscription {
    pub uri: String,
    pub callback_url: String,
    pub events: Vec<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
}

/// Provider ids are the last non-empty path segment of the resource URI.
pub fn id_from_uri(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
pub(crate) struct Resource<T> {
    pub resource: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    pub collection: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    pub next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scheduling_url: String,
    pub current_organization: Option<String>,
}

impl From<RawUser> for ProviderAccount {
    fn from(raw: RawUser) -> Self {
        Self {
            uri: raw.uri,
            name: raw.name,
            scheduling_url: raw.scheduling_url,
            organization_uri: raw.current_organization,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEventType {
    pub uri: String,
    pub name: String,
    pub slug: Option<String>,
    pub duration: i64,
    #[serde(default = "default_true")]
    pub active: bool,
    pub scheduling_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl From<RawEventType> for EventType {
    fn from(raw: RawEventType) -> Self {
        Self {
            id: id_from_uri(&raw.uri).to_string(),
            uri: raw.uri,
            slug: raw.slug,
            name: raw.name,
            duration_minutes: raw.duration,
            active: raw.active,
            scheduling_url: raw.scheduling_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAvailableTime {
    pub status: String,
    #[serde(default)]
    pub invitees_remaining: i64,
    pub start_time: DateTime<Utc>,
    pub scheduling_url: String,
}
