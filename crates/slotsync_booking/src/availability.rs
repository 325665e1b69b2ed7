use std::sync::Arc;

use chrono::{DateTime, Utc};
use slotsync_db::{SessionType, SessionTypeRepository};
use slotsync_provider::{ProviderClient, TimeSlot};
use tracing::{debug, error};

use crate::error::BookingError;
use crate::mapping::EventMappingStore;

/// Live availability for session types.
///
/// Results are a snapshot of the instant of the call and are never cached;
/// callers re-validate before booking.
pub struct AvailabilityService {
    session_types: Arc<dyn SessionTypeRepository>,
    mappings: Arc<EventMappingStore>,
    provider: Arc<dyn ProviderClient>,
}

impl AvailabilityService {
    pub fn new(
        session_types: Arc<dyn SessionTypeRepository>,
        mappings: Arc<EventMappingStore>,
        provider: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            session_types,
            mappings,
            provider,
        }
    }

    /// Bookable slots inside `[start, end]`, in start order with one slot per start.
    pub async fn get_availability(
        &self,
        session_type_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        if end <= start {
            return Err(BookingError::InvalidDateRange(format!(
                "end {} is not after start {}",
                end, start
            )));
        }
        let mapping = self.mappings.resolve(session_type_id).await?;
        self.active_session_type(session_type_id).await?;

        let slots = self
            .provider
            .get_available_times(&mapping.provider_event_type_uri, start, end)
            .await
            .map_err(|e| {
                let err = BookingError::from(e);
                if matches!(err, BookingError::ProviderAuthError(_)) {
                    error!("Provider credentials rejected while reading availability: {}", err);
                }
                err
            })?;

        let mut bookable: Vec<TimeSlot> = slots
            .into_iter()
            .filter(|s| s.remaining_capacity > 0)
            .filter(|s| s.start_time >= start && s.end_time <= end)
            .collect();
        bookable.sort_by_key(|s| s.start_time);
        bookable.dedup_by_key(|s| s.start_time);

        debug!(
            "{} bookable slots for session type {} between {} and {}",
            bookable.len(),
            session_type_id,
            start,
            end
        );
        Ok(bookable)
    }

    /// Re-checks one slot right before booking it.
    ///
    /// Returns the provider's current record of the slot, or
    /// `SlotNoLongerAvailable` if it vanished or filled up.
    pub async fn revalidate_slot(
        &self,
        session_type_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSlot, BookingError> {
        let gone = || BookingError::SlotNoLongerAvailable(start.to_rfc3339());
        let slots = match self.get_availability(session_type_id, start, end).await {
            Ok(slots) => slots,
            // A slot that has slipped into the past can no longer be booked.
            Err(BookingError::InvalidDateRange(_)) => return Err(gone()),
            Err(e) => return Err(e),
        };
        slots
            .into_iter()
            .find(|s| s.start_time == start && s.end_time == end)
            .ok_or_else(gone)
    }

    pub(crate) async fn active_session_type(
        &self,
        session_type_id: &str,
    ) -> Result<SessionType, BookingError> {
        let session_type = self
            .session_types
            .find_by_id(session_type_id)
            .await?
            .ok_or_else(|| BookingError::SessionTypeNotFound(session_type_id.to_string()))?;
        if !session_type.is_active {
            return Err(BookingError::SessionTypeInactive(session_type_id.to_string()));
        }
        Ok(session_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{session_type, slot, MockProvider};
    use chrono::{Duration, TimeZone};
    use slotsync_db::InMemoryStore;
    use slotsync_provider::ProviderError;

    const URI: &str = "https://api.calendly.com/event_types/ETX";

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, day, hour, 0, 0).unwrap()
    }

    async fn service(provider: MockProvider, active: bool, mapped: bool) -> AvailabilityService {
        let memory = InMemoryStore::new();
        memory
            .session_types()
            .upsert(session_type("st-60", 15000, active))
            .await
            .unwrap();
        if mapped {
            memory.event_mappings().upsert("st-60", "ETX", URI).await.unwrap();
        }
        let provider: Arc<dyn ProviderClient> = Arc::new(provider);
        let mappings = Arc::new(EventMappingStore::new(
            memory.event_mappings(),
            memory.session_types(),
            provider.clone(),
        ));
        AvailabilityService::new(memory.session_types(), mappings, provider)
    }

    #[tokio::test]
    async fn full_slots_and_out_of_window_slots_are_dropped() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_available_times()
            .withf(|uri, start, end| {
                uri.to_string() == URI && *start == at(1, 0) && *end == at(8, 0)
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    slot(at(2, 10), 60, 1),
                    slot(at(2, 9), 60, 0),
                    slot(at(7, 23) + Duration::minutes(30), 60, 1),
                    slot(at(3, 10), 60, 2),
                ])
            });

        let slots = service(provider, true, true)
            .await
            .get_availability("st-60", at(1, 0), at(8, 0))
            .await
            .unwrap();

        let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![at(2, 10), at(3, 10)]);
    }

    #[tokio::test]
    async fn unmapped_session_type_never_reaches_the_provider() {
        let provider = MockProvider::new();
        let err = service(provider, true, false)
            .await
            .get_availability("st-60", at(1, 0), at(2, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::MappingNotFound(_)));
    }

    #[tokio::test]
    async fn inactive_session_type_is_rejected() {
        let provider = MockProvider::new();
        let err = service(provider, false, true)
            .await
            .get_availability("st-60", at(1, 0), at(2, 0))
            .await
            .unwrap_err();
        assert_eq!(err, BookingError::SessionTypeInactive("st-60".to_string()));
    }

    #[tokio::test]
    async fn provider_outage_is_retryable() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_available_times()
            .returning(|_, _, _| Err(ProviderError::Unavailable("timed out".into())));
        let err = service(provider, true, true)
            .await
            .get_availability("st-60", at(1, 0), at(2, 0))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn revalidation_detects_vanished_slot() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_available_times()
            .returning(|_, _, _| Ok(vec![slot(at(2, 10), 60, 0)]));
        let err = service(provider, true, true)
            .await
            .revalidate_slot("st-60", at(2, 10), at(2, 11))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotNoLongerAvailable(_)));
    }

    #[tokio::test]
    async fn revalidation_returns_current_slot() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_available_times()
            .returning(|_, _, _| Ok(vec![slot(at(2, 10), 60, 1)]));
        let current = service(provider, true, true)
            .await
            .revalidate_slot("st-60", at(2, 10), at(2, 11))
            .await
            .unwrap();
        assert_eq!(current.start_time, at(2, 10));
    }
}
