use crate::models::TimeSlot;
use crate::window::{merge_slots, split_window};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

prop_compose! {
    fn arb_slot()(offset_min in 0i64..(60 * 24 * 30), len_min in 15i64..120) -> TimeSlot {
        let start = base() + Duration::minutes(offset_min);
        TimeSlot {
            start_time: start,
            end_time: start + Duration::minutes(len_min),
            scheduling_handle: format!("handle-{}", offset_min),
            remaining_capacity: 1,
        }
    }
}

proptest! {
    #[test]
    fn chunks_cover_the_window_without_gaps(
        start_h in 0i64..(24 * 20),
        len_h in 1i64..(24 * 40),
        max_days in 1i64..10,
    ) {
        let start = base() + Duration::hours(start_h);
        let end = start + Duration::hours(len_h);
        let chunks = split_window(start, end, max_days, 64, base()).unwrap();

        prop_assert_eq!(chunks.first().map(|c| c.0), Some(start));
        prop_assert_eq!(chunks.last().map(|c| c.1), Some(end));
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[0].1, pair[1].0);
        }
        for (chunk_start, chunk_end) in &chunks {
            prop_assert!(chunk_start < chunk_end);
            prop_assert!(*chunk_end - *chunk_start <= Duration::days(max_days));
        }
    }

    #[test]
    fn merged_slots_stay_in_window_with_unique_starts(
        slots in proptest::collection::vec(arb_slot(), 0..60),
        from_h in 0i64..(24 * 10),
        len_h in 1i64..(24 * 20),
    ) {
        let start = base() + Duration::hours(from_h);
        let end = start + Duration::hours(len_h);
        let merged = merge_slots(slots, start, end);

        for slot in &merged {
            prop_assert!(slot.start_time >= start);
            prop_assert!(slot.end_time <= end);
        }
        for pair in merged.windows(2) {
            prop_assert!(pair[0].start_time < pair[1].start_time);
        }
    }
}
