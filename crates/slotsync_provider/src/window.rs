//! Availability window handling.
//!
//! The provider caps how far one availability call may reach. Longer windows are
//! cut into consecutive chunks and the per-chunk results merged back.

use chrono::{DateTime, Duration, Utc};

use crate::error::ProviderError;
use crate::models::TimeSlot;

/// Validates a requested window and cuts it into chunks of at most `max_days`.
///
/// A start in the past is clamped to `now`; the provider refuses past starts.
/// Windows needing more than `max_chunks` provider calls are refused.
pub fn split_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    max_days: i64,
    max_chunks: usize,
    now: DateTime<Utc>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, ProviderError> {
    if end <= start {
        return Err(ProviderError::InvalidDateRange(format!(
            "end {} is not after start {}",
            end, start
        )));
    }
    if end <= now {
        return Err(ProviderError::InvalidDateRange(format!(
            "window ending {} lies in the past",
            end
        )));
    }

    let step = Duration::days(max_days.max(1));
    let mut cursor = start.max(now);
    let step_secs = step.num_seconds();
    let needed = ((end - cursor).num_seconds() + step_secs - 1) / step_secs;
    if usize::try_from(needed).map_or(true, |n| n > max_chunks) {
        return Err(ProviderError::InvalidDateRange(format!(
            "window from {} to {} needs {} provider calls, at most {} allowed",
            cursor, end, needed, max_chunks
        )));
    }

    let mut chunks = Vec::new();
    while cursor < end {
        let chunk_end = (cursor + step).min(end);
        chunks.push((cursor, chunk_end));
        cursor = chunk_end;
    }
    Ok(chunks)
}

/// Keeps slots fully inside `[start, end]`, sorted by start time, one per start.
pub fn merge_slots(
    mut slots: Vec<TimeSlot>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<TimeSlot> {
    slots.retain(|s| s.start_time >= start && s.end_time <= end);
    slots.sort_by_key(|s| s.start_time);
    slots.dedup_by_key(|s| s.start_time);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, day, hour, 0, 0).unwrap()
    }

    fn slot(start: DateTime<Utc>) -> TimeSlot {
        TimeSlot {
            start_time: start,
            end_time: start + Duration::minutes(30),
            scheduling_handle: format!("https://calendly.com/x/{}", start.timestamp()),
            remaining_capacity: 1,
        }
    }

    #[test]
    fn short_window_is_a_single_chunk() {
        let chunks = split_window(at(1, 0), at(3, 0), 7, 8, at(1, 0)).unwrap();
        assert_eq!(chunks, vec![(at(1, 0), at(3, 0))]);
    }

    #[test]
    fn long_window_is_split_into_consecutive_chunks() {
        let chunks = split_window(at(1, 0), at(20, 0), 7, 8, at(1, 0)).unwrap();
        assert_eq!(
            chunks,
            vec![(at(1, 0), at(8, 0)), (at(8, 0), at(15, 0)), (at(15, 0), at(20, 0))]
        );
    }

    #[test]
    fn past_start_is_clamped_to_now() {
        let chunks = split_window(at(1, 0), at(2, 0), 7, 8, at(1, 12)).unwrap();
        assert_eq!(chunks, vec![(at(1, 12), at(2, 0))]);
    }

    #[test]
    fn inverted_empty_and_past_windows_are_rejected() {
        assert!(matches!(
            split_window(at(2, 0), at(1, 0), 7, 8, at(1, 0)),
            Err(ProviderError::InvalidDateRange(_))
        ));
        assert!(matches!(
            split_window(at(2, 0), at(2, 0), 7, 8, at(1, 0)),
            Err(ProviderError::InvalidDateRange(_))
        ));
        assert!(matches!(
            split_window(at(1, 0), at(2, 0), 7, 8, at(3, 0)),
            Err(ProviderError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn window_needing_too_many_calls_is_rejected() {
        let century = Utc.with_ymd_and_hms(2130, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            split_window(at(1, 0), century, 7, 8, at(1, 0)),
            Err(ProviderError::InvalidDateRange(_))
        ));
        // Exactly at the limit: 8 weeks in 8 calls.
        let chunks = split_window(at(1, 0), at(1, 0) + Duration::days(56), 7, 8, at(1, 0)).unwrap();
        assert_eq!(chunks.len(), 8);
        assert!(split_window(at(1, 0), at(1, 0) + Duration::days(57), 7, 8, at(1, 0)).is_err());
    }

    #[test]
    fn merge_sorts_dedups_and_drops_out_of_window_slots() {
        let merged = merge_slots(
            vec![
                slot(at(2, 10)),
                slot(at(1, 9)),
                slot(at(2, 10)),
                slot(at(5, 23)),
                slot(at(1, 0)),
            ],
            at(1, 1),
            at(5, 0),
        );
        let starts: Vec<_> = merged.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![at(1, 9), at(2, 10)]);
    }
}
