//! Core traits
//!
//! [`SegmentStore`] is the durable tier of the log. [`Clock`] supplies the
//! current time to retention so tests can control it.

use std::ops::Range;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::error::StorageError;
use crate::model::{OwnerId, SegmentId};
use crate::segment::{PersistedSegment, SegmentKey, SegmentSummary};

/// Durable storage for sealed segments, keyed by `(owner, segment id)`
///
/// Implementations must be safe to call concurrently for different owners.
/// Calls for the same owner are issued sequentially by that owner.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Insert or overwrite a segment
    async fn upsert(&self, segment: PersistedSegment) -> Result<(), StorageError>;

    /// Fetch only the newest entry timestamp of a segment
    async fn try_get_last_entry_timestamp(
        &self,
        key: &SegmentKey,
    ) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Delete one segment, returning whether it existed
    async fn remove(&self, key: &SegmentKey) -> Result<bool, StorageError>;

    /// Delete every segment of an owner, returning how many were removed
    async fn remove_all_for_owner(&self, owner_id: &OwnerId) -> Result<usize, StorageError>;

    async fn try_get(&self, key: &SegmentKey) -> Result<Option<PersistedSegment>, StorageError>;

    /// Lowest-id segment in `segment_ids` whose last entry is at or after `time`
    async fn try_find_first_segment_at_or_after_time(
        &self,
        owner_id: &OwnerId,
        time: DateTime<Utc>,
        segment_ids: Range<SegmentId>,
    ) -> Result<Option<PersistedSegment>, StorageError>;

    /// Metadata of all stored segments of an owner, ascending by id
    async fn list_segments(&self, owner_id: &OwnerId) -> Result<Vec<SegmentSummary>, StorageError>;
}

/// Time source
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}
