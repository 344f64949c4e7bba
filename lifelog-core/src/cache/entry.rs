//! One day's cached state and its persisted payload.
//!
//! Payload shape (pretty JSON):
//!
//! ```json
//! {
//!   "data_date": "2023-07-14",
//!   "fetched_on_date": "2023-07-15",
//!   "logs": [ ... ],
//!   "confirmed_complete_up_to_date": "2023-07-15"
//! }
//! ```
//!
//! A legacy payload is a bare JSON array of records. It decodes with
//! `data_date = fetched_on_date = expected day` and no confirmation stamp,
//! so it is never trusted until rewritten.

use super::CacheError;
use crate::domain::Lifelog;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's cached records plus completeness metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data_date: NaiveDate,
    pub fetched_on_date: NaiveDate,
    pub logs: Vec<Lifelog>,
    pub confirmed_complete_up_to_date: Option<NaiveDate>,
}

impl CacheEntry {
    pub fn new(
        logs: Vec<Lifelog>,
        data_date: NaiveDate,
        fetched_on_date: NaiveDate,
        confirmed_complete_up_to_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            data_date,
            fetched_on_date,
            logs,
            confirmed_complete_up_to_date,
        }
    }

    pub fn has_logs(&self) -> bool {
        !self.logs.is_empty()
    }

    /// True iff a strictly later day's data has been observed.
    ///
    /// Equality does not count: a day cannot confirm itself.
    pub fn is_trusted(&self) -> bool {
        matches!(self.confirmed_complete_up_to_date, Some(c) if c > self.data_date)
    }

    /// Same logs and dates, new stamp.
    pub fn with_confirmation(mut self, confirmed: NaiveDate) -> Self {
        self.confirmed_complete_up_to_date = Some(confirmed);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPayload {
    Structured(CacheEntry),
    Legacy(Vec<Lifelog>),
}

/// Decode a stored payload for `expected_day`.
pub fn decode_entry(bytes: &[u8], expected_day: NaiveDate) -> Result<CacheEntry, CacheError> {
    let payload: StoredPayload =
        serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt {
            day: expected_day,
            reason: e.to_string(),
        })?;

    match payload {
        StoredPayload::Structured(entry) => {
            if entry.data_date != expected_day {
                return Err(CacheError::Corrupt {
                    day: expected_day,
                    reason: format!("payload is for {}", entry.data_date),
                });
            }
            Ok(entry)
        }
        StoredPayload::Legacy(logs) => Ok(CacheEntry::new(logs, expected_day, expected_day, None)),
    }
}

/// Encode an entry in the structured format.
pub fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec_pretty(entry).map_err(|e| CacheError::Serialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn trust_requires_strictly_later_stamp() {
        let d = day(2023, 7, 13);
        let entry = CacheEntry::new(vec![Lifelog::stub("a", d)], d, d, None);
        assert!(!entry.is_trusted());

        let self_confirmed = entry.clone().with_confirmation(d);
        assert!(!self_confirmed.is_trusted());

        let confirmed = entry.with_confirmation(day(2023, 7, 14));
        assert!(confirmed.is_trusted());
    }

    #[test]
    fn empty_entry_can_be_trusted() {
        let d = day(2023, 7, 13);
        let entry = CacheEntry::new(vec![], d, d, Some(day(2023, 7, 14)));
        assert!(!entry.has_logs());
        assert!(entry.is_trusted());
    }

    #[test]
    fn structured_payload_uses_iso_dates() {
        let d = day(2023, 7, 13);
        let entry = CacheEntry::new(vec![Lifelog::stub("a", d)], d, day(2023, 7, 15), None);
        let bytes = encode_entry(&entry).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["data_date"], "2023-07-13");
        assert_eq!(json["fetched_on_date"], "2023-07-15");
        assert!(json["confirmed_complete_up_to_date"].is_null());
        assert_eq!(json["logs"][0]["id"], "a");
        assert_eq!(decode_entry(&bytes, d).unwrap(), entry);
    }

    #[test]
    fn legacy_array_decodes_untrusted() {
        let d = day(2023, 7, 12);
        let bytes = br#"[{"id": "old", "date": "2023-07-12"}]"#;
        let entry = decode_entry(bytes, d).unwrap();

        assert_eq!(entry.logs.len(), 1);
        assert_eq!(entry.data_date, d);
        assert_eq!(entry.fetched_on_date, d);
        assert_eq!(entry.confirmed_complete_up_to_date, None);
        assert!(!entry.is_trusted());
    }

    #[test]
    fn garbage_and_incomplete_payloads_are_corrupt() {
        let d = day(2023, 7, 12);
        for bytes in [&b"{not json"[..], br#"{"data_date": "2023-07-12"}"#, br#""text""#] {
            match decode_entry(bytes, d) {
                Err(CacheError::Corrupt { day, .. }) => assert_eq!(day, d),
                other => panic!("expected Corrupt, got {other:?}"),
            }
        }
    }

    #[test]
    fn payload_for_another_day_is_corrupt() {
        let entry = CacheEntry::new(vec![], day(2023, 7, 1), day(2023, 7, 1), None);
        let bytes = encode_entry(&entry).unwrap();
        assert!(matches!(
            decode_entry(&bytes, day(2023, 7, 2)),
            Err(CacheError::Corrupt { .. })
        ));
    }
}
