//! Retention: bounded culling of the oldest persisted segments
//!
//! A cull removes the `n` oldest persisted segments for the largest `n`
//! such that:
//!
//! - `n` stays within `max_persisted_segments_to_remove_at_once`
//! - at least `min_persisted_segments_to_retain` remain
//! - each removed segment is either beyond `max_persisted_segments_to_retain`
//!   or its newest entry is older than the retention window
//!
//! The search stops at the first segment that may not be removed. Only the
//! last-entry timestamp is read from the store, never the payload.
//!
//! Bookkeeping is persisted through a [`StatePersister`] before any bytes are
//! deleted, so a crash can leave orphaned segments in the store but never
//! bookkeeping that points at deleted ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seglog_core::{LogEntry, OwnerId, RetentionConfig, SegmentKey, SegmentStore};
use tracing::{debug, info, instrument, warn};

use crate::error::EventLogError;
use crate::state::EventLogState;

/// Makes an owner's event log bookkeeping durable
#[async_trait]
pub trait StatePersister<E: LogEntry>: Send + Sync {
    async fn persist(&self, state: &EventLogState<E>) -> Result<(), EventLogError>;
}

/// Persister for owners that store their state some other way
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersister;

#[async_trait]
impl<E: LogEntry> StatePersister<E> for NoopPersister {
    async fn persist(&self, _state: &EventLogState<E>) -> Result<(), EventLogError> {
        Ok(())
    }
}

/// Remove aged-out persisted segments, returning how many were removed
#[instrument(skip_all, fields(owner = %owner_id))]
pub async fn cull<E, P>(
    state: &mut EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    config: &RetentionConfig,
    now: DateTime<Utc>,
    persister: &P,
) -> Result<u32, EventLogError>
where
    E: LogEntry,
    P: StatePersister<E> + ?Sized,
{
    let persisted_count = state.persisted_count();
    let oldest = state.oldest_available_segment_id();
    let threshold = config.retention_threshold(now);

    let mut removable = 0u32;
    loop {
        if removable >= config.max_persisted_segments_to_remove_at_once {
            break;
        }

        let remaining = persisted_count - removable;
        if remaining <= config.min_persisted_segments_to_retain {
            break;
        }
        if remaining > config.max_persisted_segments_to_retain {
            removable += 1;
            continue;
        }

        let key = SegmentKey::new(owner_id.clone(), oldest + removable);
        match store.try_get_last_entry_timestamp(&key).await? {
            Some(last_entry) if last_entry < threshold => removable += 1,
            Some(_) => break,
            None => {
                warn!(segment = %key, "Persisted segment missing during retention check, treating as removable");
                removable += 1;
            }
        }
    }

    if removable == 0 {
        debug!(persisted_count, "Nothing to cull");
        return Ok(0);
    }

    state.advance_oldest_available(removable);
    persister.persist(state).await?;

    for segment_id in oldest..oldest + removable {
        let key = SegmentKey::new(owner_id.clone(), segment_id);
        if !store.remove(&key).await? {
            warn!(segment = %key, "Persisted segment already gone when culling");
        }
    }

    info!(
        removed = removable,
        oldest_available = state.oldest_available_segment_id(),
        remaining = state.persisted_count(),
        "Culled persisted segments"
    );
    Ok(removable)
}

/// Forget and delete every persisted segment of the owner
///
/// Bookkeeping is cleared and persisted first. The store is then swept for
/// the whole owner, which also catches segments that were written but never
/// recorded in bookkeeping. Returns the number of segments the store removed.
#[instrument(skip_all, fields(owner = %owner_id))]
pub async fn remove_all<E, P>(
    state: &mut EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    persister: &P,
) -> Result<usize, EventLogError>
where
    E: LogEntry,
    P: StatePersister<E> + ?Sized,
{
    if state.persisted_count() > 0 {
        state.forget_all_persisted_segments();
        persister.persist(state).await?;
    }

    let removed = store.remove_all_for_owner(owner_id).await?;
    info!(removed, "Removed all persisted segments");
    Ok(removed)
}
