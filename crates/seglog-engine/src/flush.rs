//! Flush: pending segments to the store, oldest first

use chrono::{DateTime, Utc};
use seglog_core::{LogEntry, OwnerId, PersistedSegment, SegmentStore};
use tracing::{debug, instrument};

use crate::error::EventLogError;
use crate::state::EventLogState;

/// Persist every pending segment, returning how many were written
///
/// Writes are upserts: a segment with the same id may remain from an
/// earlier incarnation of the owner that crashed before persisting its
/// bookkeeping, and this owner's state is authoritative over it. A segment
/// leaves the pending queue only after its write succeeds, so a failed
/// flush can simply be retried.
#[instrument(skip_all, fields(owner = %owner_id))]
pub async fn flush<E: LogEntry>(
    state: &mut EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    now: DateTime<Utc>,
) -> Result<usize, EventLogError> {
    let mut flushed = 0;

    while let Some(segment_id) = state.next_pending_segment_id() {
        let (segment, num_entries) = match state.front_pending() {
            Some(payload) => (
                PersistedSegment::seal(owner_id.clone(), segment_id, payload, now)?,
                payload.entries.len(),
            ),
            None => break,
        };
        let bytes = segment.payload.len();

        store.upsert(segment).await?;
        state.pop_pending();

        debug!(segment_id, num_entries, bytes, "Flushed segment");
        flushed += 1;
    }

    Ok(flushed)
}
