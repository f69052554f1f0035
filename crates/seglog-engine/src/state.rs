//! Per-owner event log bookkeeping
//!
//! Segment ids fall into three contiguous ranges:
//!
//! ```text
//! oldest_available        persisted_end                  running_segment_id
//!       |--- persisted ---|--- pending (in memory) ---|--- live buffer
//! ```
//!
//! `persisted_end = running_segment_id - pending_segments.len()`. The state is
//! serializable so the owner can store it alongside its own model.

use std::collections::VecDeque;
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use seglog_core::{
    EntryHeader, EntryIndex, EntryUniqueId, LogEntry, RetentionConfig, SegmentId, SegmentPayload,
};

/// Bookkeeping of one owner's segmented log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogState<E> {
    running_entry_id: u64,
    running_segment_id: SegmentId,
    oldest_available_segment_id: SegmentId,
    latest_segment_entries: Vec<E>,
    pending_segments: VecDeque<SegmentPayload<E>>,
    previous_segment_last_entry_unique_id: EntryUniqueId,
}

impl<E> Default for EventLogState<E> {
    fn default() -> Self {
        Self {
            running_entry_id: 0,
            running_segment_id: 0,
            oldest_available_segment_id: 0,
            latest_segment_entries: Vec::new(),
            pending_segments: VecDeque::new(),
            previous_segment_last_entry_unique_id: EntryUniqueId::ZERO,
        }
    }
}

impl<E: LogEntry> EventLogState<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry built from the assigned header
    ///
    /// Seals the live buffer into a pending segment once it holds at least
    /// the configured segment size. The whole buffer moves, even if the
    /// size was lowered since the buffer started, so cursors already issued
    /// into it stay valid. Returns the entry's sequential id.
    pub fn append<F>(
        &mut self,
        config: &RetentionConfig,
        collected_at: DateTime<Utc>,
        unique_id: EntryUniqueId,
        build: F,
    ) -> u64
    where
        F: FnOnce(EntryHeader) -> E,
    {
        let sequential_id = self.running_entry_id;
        let entry = build(EntryHeader::new(sequential_id, collected_at, unique_id));
        debug_assert_eq!(
            entry.sequential_id(),
            sequential_id,
            "entry builder must keep the assigned sequential id"
        );

        self.latest_segment_entries.push(entry);
        self.running_entry_id += 1;

        if self.latest_segment_entries.len() >= config.num_entries_per_persisted_segment {
            let entries = std::mem::take(&mut self.latest_segment_entries);
            self.pending_segments.push_back(SegmentPayload::new(
                entries,
                self.previous_segment_last_entry_unique_id,
            ));
            self.running_segment_id += 1;
            self.previous_segment_last_entry_unique_id = unique_id;
        }

        sequential_id
    }

    pub fn can_flush(&self) -> bool {
        !self.pending_segments.is_empty()
    }

    /// Next sequential id to assign
    pub fn running_entry_id(&self) -> u64 {
        self.running_entry_id
    }

    /// Id of the live buffer segment
    pub fn running_segment_id(&self) -> SegmentId {
        self.running_segment_id
    }

    pub fn oldest_available_segment_id(&self) -> SegmentId {
        self.oldest_available_segment_id
    }

    pub fn latest_segment_entries(&self) -> &[E] {
        &self.latest_segment_entries
    }

    /// Index one past the newest live entry
    pub fn latest_segment_len(&self) -> EntryIndex {
        self.latest_segment_entries.len() as EntryIndex
    }

    pub fn previous_segment_last_entry_unique_id(&self) -> EntryUniqueId {
        self.previous_segment_last_entry_unique_id
    }

    pub fn pending_segments(&self) -> &VecDeque<SegmentPayload<E>> {
        &self.pending_segments
    }

    pub fn pending_count(&self) -> u32 {
        self.pending_segments.len() as u32
    }

    /// First id that is not yet persisted
    pub fn persisted_end(&self) -> SegmentId {
        self.running_segment_id - self.pending_count()
    }

    /// Ids of segments the store is expected to hold
    pub fn persisted_segment_ids(&self) -> Range<SegmentId> {
        self.oldest_available_segment_id..self.persisted_end()
    }

    pub fn persisted_count(&self) -> u32 {
        self.persisted_end() - self.oldest_available_segment_id
    }

    /// Whether nothing has ever been appended
    pub fn is_empty(&self) -> bool {
        self.running_entry_id == 0
    }

    /// Id of the oldest pending segment, if any
    pub(crate) fn next_pending_segment_id(&self) -> Option<SegmentId> {
        self.can_flush().then(|| self.persisted_end())
    }

    pub(crate) fn front_pending(&self) -> Option<&SegmentPayload<E>> {
        self.pending_segments.front()
    }

    pub(crate) fn pop_pending(&mut self) -> Option<SegmentPayload<E>> {
        self.pending_segments.pop_front()
    }

    pub(crate) fn pending_at(&self, segment_id: SegmentId) -> Option<&SegmentPayload<E>> {
        let offset = segment_id.checked_sub(self.persisted_end())?;
        self.pending_segments.get(offset as usize)
    }

    pub(crate) fn advance_oldest_available(&mut self, count: u32) {
        self.oldest_available_segment_id += count;
        debug_assert!(self.oldest_available_segment_id <= self.persisted_end());
    }

    /// Drop bookkeeping of every persisted segment; pending ones stay
    pub(crate) fn forget_all_persisted_segments(&mut self) {
        self.oldest_available_segment_id = self.persisted_end();
    }
}
