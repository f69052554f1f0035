//! In-memory segment store
//!
//! Suitable for tests, simulations and owners whose history does not need
//! to survive a restart.

use std::collections::BTreeMap;
use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use seglog_core::{
    OwnerId, PersistedSegment, SegmentId, SegmentKey, SegmentStore, SegmentSummary, StorageError,
};
use tracing::trace;

/// In-memory implementation of SegmentStore
///
/// Uses `DashMap` so different owners never contend; each owner's
/// segments sit in a `BTreeMap` ordered by segment id.
#[derive(Debug, Default)]
pub struct InMemorySegmentStore {
    owners: DashMap<OwnerId, BTreeMap<SegmentId, PersistedSegment>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored segments across all owners
    pub fn segment_count(&self) -> usize {
        self.owners.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of owners with at least one stored segment
    pub fn owner_count(&self) -> usize {
        self.owners.iter().filter(|entry| !entry.value().is_empty()).count()
    }

    /// Ids of an owner's stored segments, ascending
    pub fn segment_ids(&self, owner_id: &OwnerId) -> Vec<SegmentId> {
        self.owners
            .get(owner_id)
            .map(|segments| segments.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn upsert(&self, segment: PersistedSegment) -> Result<(), StorageError> {
        trace!(owner = %segment.owner_id, segment_id = segment.segment_id, "Upserting segment");
        self.owners
            .entry(segment.owner_id.clone())
            .or_default()
            .insert(segment.segment_id, segment);
        Ok(())
    }

    async fn try_get_last_entry_timestamp(
        &self,
        key: &SegmentKey,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.owners.get(&key.owner_id).and_then(|segments| {
            segments
                .get(&key.segment_id)
                .map(|segment| segment.last_entry_timestamp)
        }))
    }

    async fn remove(&self, key: &SegmentKey) -> Result<bool, StorageError> {
        let removed = self
            .owners
            .get_mut(&key.owner_id)
            .is_some_and(|mut segments| segments.remove(&key.segment_id).is_some());
        self.owners.remove_if(&key.owner_id, |_, segments| segments.is_empty());
        Ok(removed)
    }

    async fn remove_all_for_owner(&self, owner_id: &OwnerId) -> Result<usize, StorageError> {
        Ok(self
            .owners
            .remove(owner_id)
            .map(|(_, segments)| segments.len())
            .unwrap_or(0))
    }

    async fn try_get(&self, key: &SegmentKey) -> Result<Option<PersistedSegment>, StorageError> {
        Ok(self
            .owners
            .get(&key.owner_id)
            .and_then(|segments| segments.get(&key.segment_id).cloned()))
    }

    async fn try_find_first_segment_at_or_after_time(
        &self,
        owner_id: &OwnerId,
        time: DateTime<Utc>,
        segment_ids: Range<SegmentId>,
    ) -> Result<Option<PersistedSegment>, StorageError> {
        if segment_ids.is_empty() {
            return Ok(None);
        }

        Ok(self.owners.get(owner_id).and_then(|segments| {
            segments
                .range(segment_ids)
                .map(|(_, segment)| segment)
                .find(|segment| segment.last_entry_timestamp >= time)
                .cloned()
        }))
    }

    async fn list_segments(&self, owner_id: &OwnerId) -> Result<Vec<SegmentSummary>, StorageError> {
        Ok(self
            .owners
            .get(owner_id)
            .map(|segments| segments.values().map(PersistedSegment::summary).collect())
            .unwrap_or_default())
    }
}
