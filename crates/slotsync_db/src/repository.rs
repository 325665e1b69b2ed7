//! Repository traits.
//!
//! One trait per persisted record. Components receive them as
//! `Arc<dyn XRepository>` so SQL implementations and the in-memory fakes in
//! [`crate::memory`] are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{
    Booking, BookingUpdate, CompletionOutcome, EventMapping, SessionType, WebhookEventRecord,
};

#[async_trait]
pub trait SessionTypeRepository: Send + Sync {
    /// Creates the backing table if it does not exist yet.
    async fn init_schema(&self) -> Result<(), DbError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionType>, DbError>;

    /// Inserts or replaces a session type by id.
    async fn upsert(&self, session_type: SessionType) -> Result<SessionType, DbError>;
}

#[async_trait]
pub trait EventMappingRepository: Send + Sync {
    async fn init_schema(&self) -> Result<(), DbError>;

    async fn find_by_session_type(
        &self,
        session_type_id: &str,
    ) -> Result<Option<EventMapping>, DbError>;

    /// Reverse lookup used when a notification names only the provider event type.
    async fn find_by_event_type_uri(&self, uri: &str) -> Result<Option<EventMapping>, DbError>;

    /// Idempotent write; replaces any prior mapping for the session type.
    async fn upsert(
        &self,
        session_type_id: &str,
        provider_event_type_id: &str,
        provider_event_type_uri: &str,
    ) -> Result<EventMapping, DbError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn init_schema(&self) -> Result<(), DbError>;

    /// Inserts a new booking.
    ///
    /// Fails with [`DbError::UniqueViolation`] while another live booking holds the
    /// same (session type, start time) slot.
    async fn insert(&self, booking: Booking) -> Result<Booking, DbError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, DbError>;

    async fn find_by_invitee_uri(&self, uri: &str) -> Result<Option<Booking>, DbError>;

    async fn find_by_event_uri(&self, uri: &str) -> Result<Option<Booking>, DbError>;

    /// The live booking holding a slot, if any.
    async fn find_by_slot(
        &self,
        session_type_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<Option<Booking>, DbError>;

    /// Compare-and-swap update. `Ok(None)` means the stored state no longer
    /// matched `update.expected` and nothing was written.
    async fn apply_update(&self, update: BookingUpdate) -> Result<Option<Booking>, DbError>;

    /// Confirmed bookings whose end time lies before `cutoff`.
    async fn find_confirmed_ended_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, DbError>;
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn init_schema(&self) -> Result<(), DbError>;

    async fn find(
        &self,
        provider_event_id: &str,
        event_kind: &str,
    ) -> Result<Option<WebhookEventRecord>, DbError>;

    /// Durably stores a received event. Returns `false` when a record for the
    /// same (event id, kind) already exists, in which case nothing changes.
    async fn record_received(&self, record: WebhookEventRecord) -> Result<bool, DbError>;

    /// Marks the record processed and applies the booking update in one
    /// transaction. Nothing is written unless both succeed.
    async fn complete_with_transition(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        update: Option<BookingUpdate>,
    ) -> Result<CompletionOutcome, DbError>;

    /// Stores why processing failed and counts the attempt; the record stays
    /// unprocessed.
    async fn mark_failed(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        error: &str,
    ) -> Result<(), DbError>;

    /// Closes a record without applying it, keeping the last error.
    async fn abandon(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        error: &str,
    ) -> Result<(), DbError>;

    /// Unprocessed records, least attempted first, then oldest first.
    async fn list_unprocessed(&self, limit: i64) -> Result<Vec<WebhookEventRecord>, DbError>;
}

/// Creates repository instances from a shared handle (pool, store, ...).
pub trait RepositoryFactory<R, C> {
    fn create_repository(&self, config: C) -> R;
}
