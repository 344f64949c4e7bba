//! Opaque lifelog records.
//!
//! The sync engine never interprets a record beyond two fields: an identifier
//! and an embedded date-like string used to partition records into days.
//! Everything else is carried through verbatim so cache files round-trip the
//! upstream payload unchanged.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fields consulted, in order, for a record's calendar day.
pub const DATE_FIELDS: [&str; 4] = ["date", "created_at", "timestamp", "startTime"];

/// Why a record could not be assigned to a day.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateExtractionError {
    #[error("record has no date field")]
    MissingDate,

    #[error("unparseable record date: {0:?}")]
    Unparseable(String),
}

/// One upstream record, kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lifelog(Value);

impl Lifelog {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Minimal record carrying only an id and a date, as the tests and fakes use.
    pub fn stub(id: &str, day: NaiveDate) -> Self {
        Self(serde_json::json!({ "id": id, "date": day.to_string() }))
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// The first non-empty date-like field, unparsed.
    pub fn date_str(&self) -> Option<&str> {
        DATE_FIELDS
            .iter()
            .filter_map(|field| self.0.get(*field).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }

    /// Calendar day of the record: the first 10 characters of its date field
    /// parsed as `YYYY-MM-DD`.
    pub fn data_date(&self) -> Result<NaiveDate, DateExtractionError> {
        let raw = self.date_str().ok_or(DateExtractionError::MissingDate)?;
        let prefix = raw
            .get(..10)
            .ok_or_else(|| DateExtractionError::Unparseable(raw.to_string()))?;
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
            .map_err(|_| DateExtractionError::Unparseable(raw.to_string()))
    }
}

impl From<Value> for Lifelog {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
