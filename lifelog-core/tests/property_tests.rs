//! Property tests for cache entries and day ranges.
//!
//! 1. Trust rule — an entry is trusted iff its stamp is strictly after its day
//! 2. Codec — structured entries survive encode/decode unchanged
//! 3. Ranges — iteration length matches `len()` and stays inside the bounds

use chrono::{Days, NaiveDate};
use lifelog_core::cache::{decode_entry, encode_entry};
use lifelog_core::{CacheEntry, DayRange, DayStatus, Lifelog};
use proptest::prelude::*;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

fn arb_day() -> impl Strategy<Value = NaiveDate> {
    (0u64..730).prop_map(|offset| base() + Days::new(offset))
}

proptest! {
    #[test]
    fn trusted_iff_stamp_strictly_later(day in arb_day(), stamp in proptest::option::of(arb_day())) {
        let entry = CacheEntry::new(vec![], day, day, stamp);
        let expected = stamp.map(|s| s > day).unwrap_or(false);
        prop_assert_eq!(entry.is_trusted(), expected);
        prop_assert_eq!(DayStatus::of(&entry).is_trusted(day), expected);
    }

    #[test]
    fn encoded_entries_decode_unchanged(
        day in arb_day(),
        fetched in arb_day(),
        stamp in proptest::option::of(arb_day()),
        n in 0usize..6,
    ) {
        let logs = (0..n).map(|i| Lifelog::stub(&format!("id{i}"), day)).collect();
        let entry = CacheEntry::new(logs, day, fetched, stamp);
        let bytes = encode_entry(&entry).unwrap();
        prop_assert_eq!(decode_entry(&bytes, day).unwrap(), entry);
    }

    #[test]
    fn range_iteration_matches_len(start in arb_day(), span in 0u64..60) {
        let range = DayRange::new(start, start + Days::new(span));
        let days: Vec<_> = range.days().collect();
        prop_assert_eq!(days.len(), range.len());
        prop_assert!(days.iter().all(|d| range.contains(*d)));
        prop_assert!(days.windows(2).all(|w| w[0] < w[1]));
    }
}
