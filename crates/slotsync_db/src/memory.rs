//! In-memory repositories.
//!
//! Used by tests and by the backend when no database is configured. All four
//! repositories share one state behind a mutex, so the slot constraint, the
//! compare-and-swap on bookings and the atomic webhook completion behave the
//! same as their SQL counterparts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::models::{
    now_utc, slot_key, Booking, BookingStatus, BookingUpdate, CompletionOutcome, EventMapping,
    SessionType, WebhookEventRecord,
};
use crate::repository::{
    BookingRepository, EventMappingRepository, SessionTypeRepository, WebhookEventRepository,
};

#[derive(Debug, Default)]
struct MemoryState {
    session_types: HashMap<String, SessionType>,
    mappings: HashMap<String, EventMapping>,
    bookings: HashMap<String, Booking>,
    /// slot key -> booking id, live bookings only
    slots: HashMap<String, String>,
    webhook_events: Vec<WebhookEventRecord>,
}

impl MemoryState {
    fn apply_update(&mut self, update: &BookingUpdate) -> Option<Booking> {
        let booking = self.bookings.get_mut(&update.booking_id)?;
        if booking.state() != update.expected {
            return None;
        }

        booking.status = update.next.status;
        booking.payment_status = update.next.payment_status;
        booking.provider_confirmed = update.next.provider_confirmed;
        if let Some(reference) = &update.payment_reference {
            booking.payment_reference = Some(reference.clone());
        }
        if let Some(uri) = &update.provider_event_uri {
            booking.provider_event_uri = Some(uri.clone());
        }
        if let Some(uri) = &update.provider_invitee_uri {
            booking.provider_invitee_uri = Some(uri.clone());
        }
        booking.updated_at = now_utc();

        let updated = booking.clone();
        if updated.status == BookingStatus::Canceled {
            let key = slot_key(&updated.session_type_id, &updated.start_time);
            if self.slots.get(&key) == Some(&updated.id) {
                self.slots.remove(&key);
            }
        }
        Some(updated)
    }

    fn webhook_event_mut(&mut self, id: &str, kind: &str) -> Option<&mut WebhookEventRecord> {
        self.webhook_events
            .iter_mut()
            .find(|r| r.provider_event_id == id && r.event_kind == kind)
    }
}

/// Shared in-memory state handing out repository views.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_types(&self) -> Arc<dyn SessionTypeRepository> {
        Arc::new(MemorySessionTypes(self.clone()))
    }

    pub fn event_mappings(&self) -> Arc<dyn EventMappingRepository> {
        Arc::new(MemoryEventMappings(self.clone()))
    }

    pub fn bookings(&self) -> Arc<dyn BookingRepository> {
        Arc::new(MemoryBookings(self.clone()))
    }

    pub fn webhook_events(&self) -> Arc<dyn WebhookEventRepository> {
        Arc::new(MemoryWebhookEvents(self.clone()))
    }
}

#[derive(Debug, Clone)]
struct MemorySessionTypes(InMemoryStore);

#[derive(Debug, Clone)]
struct MemoryEventMappings(InMemoryStore);

#[derive(Debug, Clone)]
struct MemoryBookings(InMemoryStore);

#[derive(Debug, Clone)]
struct MemoryWebhookEvents(InMemoryStore);

#[async_trait]
impl SessionTypeRepository for MemorySessionTypes {
    async fn init_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionType>, DbError> {
        Ok(self.0.state.lock().await.session_types.get(id).cloned())
    }

    async fn upsert(&self, session_type: SessionType) -> Result<SessionType, DbError> {
        let mut state = self.0.state.lock().await;
        state
            .session_types
            .insert(session_type.id.clone(), session_type.clone());
        Ok(session_type)
    }
}

#[async_trait]
impl EventMappingRepository for MemoryEventMappings {
    async fn init_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn find_by_session_type(
        &self,
        session_type_id: &str,
    ) -> Result<Option<EventMapping>, DbError> {
        Ok(self.0.state.lock().await.mappings.get(session_type_id).cloned())
    }

    async fn find_by_event_type_uri(&self, uri: &str) -> Result<Option<EventMapping>, DbError> {
        let state = self.0.state.lock().await;
        Ok(state
            .mappings
            .values()
            .find(|m| m.provider_event_type_uri == uri)
            .cloned())
    }

    async fn upsert(
        &self,
        session_type_id: &str,
        provider_event_type_id: &str,
        provider_event_type_uri: &str,
    ) -> Result<EventMapping, DbError> {
        let now = now_utc();
        let mut state = self.0.state.lock().await;
        let created_at = state
            .mappings
            .get(session_type_id)
            .map(|m| m.created_at)
            .unwrap_or(now);
        let mapping = EventMapping {
            session_type_id: session_type_id.to_string(),
            provider_event_type_id: provider_event_type_id.to_string(),
            provider_event_type_uri: provider_event_type_uri.to_string(),
            created_at,
            updated_at: now,
        };
        state
            .mappings
            .insert(session_type_id.to_string(), mapping.clone());
        Ok(mapping)
    }
}

#[async_trait]
impl BookingRepository for MemoryBookings {
    async fn init_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn insert(&self, booking: Booking) -> Result<Booking, DbError> {
        let mut state = self.0.state.lock().await;
        if state.bookings.contains_key(&booking.id) {
            return Err(DbError::UniqueViolation(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        if booking.holds_slot() {
            let key = slot_key(&booking.session_type_id, &booking.start_time);
            if state.slots.contains_key(&key) {
                return Err(DbError::UniqueViolation(format!("slot {} is taken", key)));
            }
            state.slots.insert(key, booking.id.clone());
        }
        state.bookings.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, DbError> {
        Ok(self.0.state.lock().await.bookings.get(id).cloned())
    }

    async fn find_by_invitee_uri(&self, uri: &str) -> Result<Option<Booking>, DbError> {
        let state = self.0.state.lock().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.provider_invitee_uri.as_deref() == Some(uri))
            .cloned())
    }

    async fn find_by_event_uri(&self, uri: &str) -> Result<Option<Booking>, DbError> {
        let state = self.0.state.lock().await;
        Ok(state
            .bookings
            .values()
            .find(|b| b.provider_event_uri.as_deref() == Some(uri))
            .cloned())
    }

    async fn find_by_slot(
        &self,
        session_type_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<Option<Booking>, DbError> {
        let state = self.0.state.lock().await;
        let key = slot_key(session_type_id, &start_time);
        Ok(state
            .slots
            .get(&key)
            .and_then(|id| state.bookings.get(id))
            .cloned())
    }

    async fn apply_update(&self, update: BookingUpdate) -> Result<Option<Booking>, DbError> {
        Ok(self.0.state.lock().await.apply_update(&update))
    }

    async fn find_confirmed_ended_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, DbError> {
        let state = self.0.state.lock().await;
        let mut finished: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed && b.end_time < cutoff)
            .cloned()
            .collect();
        finished.sort_by_key(|b| b.end_time);
        finished.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(finished)
    }
}

#[async_trait]
impl WebhookEventRepository for MemoryWebhookEvents {
    async fn init_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn find(
        &self,
        provider_event_id: &str,
        event_kind: &str,
    ) -> Result<Option<WebhookEventRecord>, DbError> {
        let mut state = self.0.state.lock().await;
        Ok(state
            .webhook_event_mut(provider_event_id, event_kind)
            .map(|r| r.clone()))
    }

    async fn record_received(&self, record: WebhookEventRecord) -> Result<bool, DbError> {
        let mut state = self.0.state.lock().await;
        if state
            .webhook_event_mut(&record.provider_event_id, &record.event_kind)
            .is_some()
        {
            return Ok(false);
        }
        state.webhook_events.push(record);
        Ok(true)
    }

    async fn complete_with_transition(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        update: Option<BookingUpdate>,
    ) -> Result<CompletionOutcome, DbError> {
        let mut state = self.0.state.lock().await;

        match state.webhook_event_mut(provider_event_id, event_kind) {
            None => {
                return Err(DbError::QueryError(format!(
                    "webhook event {} ({}) was never recorded",
                    provider_event_id, event_kind
                )));
            }
            Some(record) if record.is_processed() => return Ok(CompletionOutcome::AlreadyProcessed),
            Some(_) => {}
        }

        let booking = match &update {
            Some(update) => match state.apply_update(update) {
                Some(booking) => Some(booking),
                None => return Ok(CompletionOutcome::BookingChanged),
            },
            None => None,
        };

        if let Some(record) = state.webhook_event_mut(provider_event_id, event_kind) {
            record.processed_at = Some(now_utc());
            record.processing_error = None;
        }
        Ok(CompletionOutcome::Completed(booking))
    }

    async fn mark_failed(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        error: &str,
    ) -> Result<(), DbError> {
        let mut state = self.0.state.lock().await;
        if let Some(record) = state.webhook_event_mut(provider_event_id, event_kind) {
            if !record.is_processed() {
                record.processing_error = Some(error.to_string());
                record.attempts += 1;
            }
        }
        Ok(())
    }

    async fn abandon(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        error: &str,
    ) -> Result<(), DbError> {
        let mut state = self.0.state.lock().await;
        if let Some(record) = state.webhook_event_mut(provider_event_id, event_kind) {
            if !record.is_processed() {
                record.processed_at = Some(now_utc());
                record.processing_error = Some(error.to_string());
            }
        }
        Ok(())
    }

    async fn list_unprocessed(&self, limit: i64) -> Result<Vec<WebhookEventRecord>, DbError> {
        let state = self.0.state.lock().await;
        let mut pending: Vec<WebhookEventRecord> = state
            .webhook_events
            .iter()
            .filter(|r| !r.is_processed())
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.attempts, r.received_at));
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }
}
