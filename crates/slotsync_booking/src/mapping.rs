//! Session type to provider event type mappings.
//!
//! Mappings are only ever established deliberately: either written explicitly, or
//! linked by the provider-assigned event type id found through discovery. Titles
//! and slugs are never compared.

use std::sync::Arc;

use slotsync_db::{EventMapping, EventMappingRepository, SessionType, SessionTypeRepository};
use slotsync_provider::{id_from_uri, EventType, ProviderClient};
use tracing::{info, warn};

use crate::error::BookingError;

pub struct EventMappingStore {
    mappings: Arc<dyn EventMappingRepository>,
    session_types: Arc<dyn SessionTypeRepository>,
    provider: Arc<dyn ProviderClient>,
}

impl EventMappingStore {
    pub fn new(
        mappings: Arc<dyn EventMappingRepository>,
        session_types: Arc<dyn SessionTypeRepository>,
        provider: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            mappings,
            session_types,
            provider,
        }
    }

    /// The mapping for a session type. A missing mapping is a configuration
    /// problem for the builder and is not worth retrying.
    pub async fn resolve(&self, session_type_id: &str) -> Result<EventMapping, BookingError> {
        self.mappings
            .find_by_session_type(session_type_id)
            .await?
            .ok_or_else(|| {
                BookingError::MappingNotFound(format!(
                    "session type {} is not linked to a provider event type",
                    session_type_id
                ))
            })
    }

    /// Writes a mapping, replacing any previous one for the session type.
    pub async fn upsert(
        &self,
        session_type_id: &str,
        provider_event_type_id: &str,
        provider_event_type_uri: &str,
    ) -> Result<EventMapping, BookingError> {
        if provider_event_type_id.trim().is_empty() || provider_event_type_uri.trim().is_empty() {
            return Err(BookingError::MalformedPayload(
                "provider event type id and uri are required".to_string(),
            ));
        }
        self.session_type(session_type_id).await?;

        let mapping = self
            .mappings
            .upsert(session_type_id, provider_event_type_id, provider_event_type_uri)
            .await?;
        info!(
            "Session type {} mapped to provider event type {}",
            session_type_id, provider_event_type_id
        );
        Ok(mapping)
    }

    /// Links a session type to the provider event type with the given id.
    ///
    /// The id is matched against the event types the provider lists for the
    /// account; inactive event types cannot be linked.
    pub async fn link_session_type(
        &self,
        session_type_id: &str,
        provider_event_type_id: &str,
    ) -> Result<EventMapping, BookingError> {
        self.session_type(session_type_id).await?;

        let event_types = self.provider.list_event_types().await?;
        let event_type = event_types
            .into_iter()
            .find(|et| et.id == provider_event_type_id || id_from_uri(&et.uri) == provider_event_type_id)
            .ok_or_else(|| {
                BookingError::MappingNotFound(format!(
                    "provider event type {} does not exist for this account",
                    provider_event_type_id
                ))
            })?;

        if !event_type.active {
            warn!(
                "Refusing to link session type {} to inactive provider event type {}",
                session_type_id, event_type.id
            );
            return Err(BookingError::MappingNotFound(format!(
                "provider event type {} is inactive",
                event_type.id
            )));
        }

        self.upsert(session_type_id, &event_type.id, &event_type.uri).await
    }

    /// Event types offered for linking.
    pub async fn discover(&self) -> Result<Vec<EventType>, BookingError> {
        Ok(self.provider.list_event_types().await?)
    }

    async fn session_type(&self, session_type_id: &str) -> Result<SessionType, BookingError> {
        self.session_types
            .find_by_id(session_type_id)
            .await?
            .ok_or_else(|| BookingError::SessionTypeNotFound(session_type_id.to_string()))
    }
}
