//! Shared unit-test helpers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use slotsync_db::SessionType;
use slotsync_provider::{
    EventType, ProviderAccount, ProviderClient, ProviderError, TimeSlot, WebhookSubscription,
    WebhookSubscriptionRequest,
};

mock! {
    pub Provider {}

    #[async_trait]
    impl ProviderClient for Provider {
        async fn get_current_account(&self) -> Result<ProviderAccount, ProviderError>;
        async fn list_event_types(&self) -> Result<Vec<EventType>, ProviderError>;
        async fn get_available_times(
            &self,
            event_type_uri: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<TimeSlot>, ProviderError>;
        async fn create_webhook_subscription(
            &self,
            request: WebhookSubscriptionRequest,
        ) -> Result<WebhookSubscription, ProviderError>;
    }
}

pub fn session_type(id: &str, price_minor: i64, is_active: bool) -> SessionType {
    SessionType {
        id: id.to_string(),
        builder_id: "builder-1".to_string(),
        title: "60-minute consultation".to_string(),
        duration_minutes: 60,
        price_minor,
        currency: "usd".to_string(),
        is_active,
        requires_auth: false,
    }
}

pub fn event_type(id: &str, active: bool) -> EventType {
    EventType {
        id: id.to_string(),
        uri: format!("https://api.calendly.com/event_types/{}", id),
        slug: Some(format!("session-{}", id.to_lowercase())),
        name: format!("Event {}", id),
        duration_minutes: 60,
        active,
        scheduling_url: Some(format!("https://calendly.com/builder/{}", id)),
    }
}

pub fn slot(start: DateTime<Utc>, minutes: i64, capacity: i64) -> TimeSlot {
    TimeSlot {
        start_time: start,
        end_time: start + chrono::Duration::minutes(minutes),
        scheduling_handle: format!("https://calendly.com/builder/x/{}", start.timestamp()),
        remaining_capacity: capacity,
    }
}
