//! Segment access across the three storage tiers

use std::borrow::Cow;

use seglog_core::{EntryUniqueId, LogEntry, OwnerId, SegmentId, SegmentKey, SegmentPayload, SegmentStore};
use tracing::trace;

use crate::error::EventLogError;
use crate::state::EventLogState;

/// Entries of one segment, borrowed from memory or decoded from the store
#[derive(Debug)]
pub struct SegmentView<'a, E: LogEntry> {
    entries: Cow<'a, [E]>,
    previous_segment_last_entry_unique_id: EntryUniqueId,
}

impl<'a, E: LogEntry> SegmentView<'a, E> {
    fn borrowed(entries: &'a [E], previous: EntryUniqueId) -> Self {
        Self {
            entries: Cow::Borrowed(entries),
            previous_segment_last_entry_unique_id: previous,
        }
    }

    fn owned(payload: SegmentPayload<E>) -> Self {
        Self {
            entries: Cow::Owned(payload.entries),
            previous_segment_last_entry_unique_id: payload.previous_segment_last_entry_unique_id,
        }
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unique id of the entry just before `index` (the back-link at 0)
    pub fn unique_id_preceding(&self, index: usize) -> EntryUniqueId {
        match index {
            0 => self.previous_segment_last_entry_unique_id,
            _ => self.entries[index - 1].unique_id(),
        }
    }
}

/// Fetch segment `segment_id`, which must lie in
/// `[oldest_available, running_segment_id]`
///
/// Persisted segments come from the store; a missing one is data loss.
/// Pending segments and the live buffer are borrowed from `state`.
pub async fn segment_view<'a, E: LogEntry>(
    state: &'a EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    segment_id: SegmentId,
) -> Result<SegmentView<'a, E>, EventLogError> {
    debug_assert!(segment_id >= state.oldest_available_segment_id());
    debug_assert!(segment_id <= state.running_segment_id());

    if segment_id < state.persisted_end() {
        let key = SegmentKey::new(owner_id.clone(), segment_id);
        trace!(segment = %key, "Reading persisted segment");
        let persisted = match store.try_get(&key).await? {
            Some(persisted) => persisted,
            None => return Err(EventLogError::MissingSegment(key)),
        };
        return Ok(SegmentView::owned(persisted.open()?));
    }

    if let Some(pending) = state.pending_at(segment_id) {
        return Ok(SegmentView::borrowed(
            &pending.entries,
            pending.previous_segment_last_entry_unique_id,
        ));
    }

    Ok(SegmentView::borrowed(
        state.latest_segment_entries(),
        state.previous_segment_last_entry_unique_id(),
    ))
}
