//! The provider seam.
//!
//! Everything above this crate talks to the scheduling provider through
//! [`ProviderClient`], so a second provider (or a mock) can be substituted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ProviderError;
use crate::models::{
    EventType, ProviderAccount, TimeSlot, WebhookSubscription, WebhookSubscriptionRequest,
};

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// The account the credentials belong to.
    async fn get_current_account(&self) -> Result<ProviderAccount, ProviderError>;

    /// Every event type of the account, following pagination.
    async fn list_event_types(&self) -> Result<Vec<EventType>, ProviderError>;

    /// Slots for one event type inside `[start, end]`, sorted by start time with
    /// one slot per start. Windows wider than the provider allows are split.
    async fn get_available_times(
        &self,
        event_type_uri: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, ProviderError>;

    /// Registers a webhook callback. Not idempotent, never retried.
    async fn create_webhook_subscription(
        &self,
        request: WebhookSubscriptionRequest,
    ) -> Result<WebhookSubscription, ProviderError>;
}
