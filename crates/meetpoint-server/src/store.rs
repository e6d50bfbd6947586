//! Meeting persistence boundary.
//!
//! The coordination subsystem produces a [`ResolvedMeeting`] and hands it to
//! a [`MeetingStore`]; the store owns the record from then on. Retry policy
//! and owner authorization live behind this seam, not in front of it — the
//! owner identity is stored as supplied.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use meetpoint_core::ResolvedMeeting;
use meetpoint_protocol::MeetingRecord;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the record.
    #[error("store rejected the record: {reason}")]
    Rejected { reason: String },
}

/// Persistence collaborator for resolved meetings.
///
/// The coordination subsystem calls `save` after producing a resolved
/// meeting and `find_by_owner` to list an owner's records; nothing else.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Persists a resolved meeting, assigning its id and creation time.
    async fn save(&self, meeting: ResolvedMeeting) -> StoreResult<MeetingRecord>;

    /// Returns every record saved for the owner, in persistence order.
    async fn find_by_owner(&self, owner_email: &str) -> StoreResult<Vec<MeetingRecord>>;
}

/// In-memory store used by the daemon and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Vec<MeetingRecord>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all owners.
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(Vec::len).sum()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MeetingStore for MemoryStore {
    async fn save(&self, meeting: ResolvedMeeting) -> StoreResult<MeetingRecord> {
        let record = MeetingRecord::new(Uuid::new_v4().to_string(), Utc::now(), meeting);
        let mut records = self.records.write().await;
        records
            .entry(record.meeting.owner_email.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn find_by_owner(&self, owner_email: &str) -> StoreResult<Vec<MeetingRecord>> {
        let records = self.records.read().await;
        Ok(records.get(owner_email).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use meetpoint_core::{MeetingOutcome, ParticipantSlot};

    fn meeting(owner: &str) -> ResolvedMeeting {
        ResolvedMeeting::new(
            owner,
            vec![ParticipantSlot::new(
                "Alice",
                "America/New_York",
                NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            )],
            MeetingOutcome::NoCommonTime,
        )
    }

    #[tokio::test]
    async fn save_assigns_distinct_ids() {
        let store = MemoryStore::new();
        let first = store.save(meeting("owner@example.com")).await.unwrap();
        let second = store.save(meeting("owner@example.com")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn find_by_owner_filters_and_preserves_order() {
        let store = MemoryStore::new();
        let first = store.save(meeting("a@example.com")).await.unwrap();
        store.save(meeting("b@example.com")).await.unwrap();
        let third = store.save(meeting("a@example.com")).await.unwrap();

        let found = store.find_by_owner("a@example.com").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, first.id);
        assert_eq!(found[1].id, third.id);
    }

    #[tokio::test]
    async fn unknown_owner_yields_empty() {
        let store = MemoryStore::new();
        store.save(meeting("a@example.com")).await.unwrap();

        let found = store.find_by_owner("nobody@example.com").await.unwrap();
        assert!(found.is_empty());
    }
}
