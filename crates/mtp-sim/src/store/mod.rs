// crates/mtp-sim/src/store/mod.rs

//! Durable override table.
//!
//! One row per canonical key holding the last externally written value as text
//! and the wall-clock time of that write. Upserts only; no history is kept.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{DEFAULT_DB_FILE, SqliteStore};

use crate::error::StoreError;
use crate::identity::CanonicalKey;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// A stored override.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    pub key: CanonicalKey,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl OverrideEntry {
    pub fn new(key: CanonicalKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
            updated_at: Utc::now(),
        }
    }

    /// Last-write-wins: true if `self` may replace `existing`.
    pub(crate) fn supersedes(&self, existing: &OverrideEntry) -> bool {
        self.updated_at >= existing.updated_at
    }
}

/// A trait for abstracting the durable storage of override values.
///
/// Implementations synchronise internally; callers never hold an external lock.
pub trait OverrideStore: Send + Sync {
    /// Inserts or replaces the override for `key`, stamped with the current time.
    fn upsert(&self, key: &CanonicalKey, value: &str) -> Result<(), StoreError>;

    /// Returns the stored override entry for `key`, if any.
    fn entry(&self, key: &CanonicalKey) -> Result<Option<OverrideEntry>, StoreError>;

    /// Returns the stored override text for `key`, if any.
    fn try_get(&self, key: &CanonicalKey) -> Result<Option<String>, StoreError> {
        Ok(self.entry(key)?.map(|e| e.value))
    }
}

/// Formats a timestamp as fixed-width ISO-8601 UTC, so stored timestamps
/// also order correctly as text.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1500);
        let (ta, tb) = (format_timestamp(&a), format_timestamp(&b));
        assert_eq!(ta, "2024-01-01T00:00:00.000000Z");
        assert_eq!(ta.len(), tb.len());
        assert!(ta < tb);
        assert_eq!(parse_timestamp(&tb), Some(b));
    }

    #[test]
    fn test_supersedes_is_last_write_wins() {
        let key = CanonicalKey::from_raw("R0001");
        let older = OverrideEntry::new(key.clone(), "1");
        let mut newer = OverrideEntry::new(key, "2");
        newer.updated_at = older.updated_at + chrono::Duration::seconds(1);
        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));
    }
}
