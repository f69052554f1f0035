//! Scan engine: cursor resolution and bidirectional traversal
//!
//! A scan resolves its start cursor to a concrete `(segment, index)`, checks
//! continuity once at the first segment it touches, then walks segments in
//! the requested direction across the persisted, pending and live tiers.
//!
//! Forward scans never advance past the live buffer, so a continuation
//! cursor left at its end picks up entries appended later. Backward scans
//! stop at the oldest available segment.

use chrono::{DateTime, Utc};
use seglog_core::{
    Cursor, DesyncReason, DirectCursor, EntryIndex, EntryUniqueId, LogEntry, OwnerId, ScanDirection,
    ScanPage, ScanRequest, ScanResponse, SegmentId, SegmentStore,
};
use tracing::{debug, instrument, trace};

use crate::access::segment_view;
use crate::error::EventLogError;
use crate::state::EventLogState;

/// Start position resolved from a request cursor
struct ResolvedStart {
    segment_id: SegmentId,
    entry_index: usize,
    /// Continuity value the caller expects, if the cursor carried one
    expected_previous: Option<EntryUniqueId>,
}

/// Read entries as described by `request`
///
/// Desync is reported in the response. Errors are reserved for invalid
/// requests, store failures and persisted segments that have gone missing.
#[instrument(skip_all, fields(owner = %owner_id, direction = ?request.direction, num_entries = request.num_entries))]
pub async fn scan<E: LogEntry>(
    state: &EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    request: &ScanRequest,
) -> Result<ScanResponse<E>, EventLogError> {
    request.validate()?;

    let start = match resolve_start(state, store, owner_id, request).await? {
        Some(start) => start,
        None => return Ok(desync(DesyncReason::CursorTooAdvanced)),
    };
    trace!(
        segment_id = start.segment_id,
        entry_index = start.entry_index,
        "Resolved scan start"
    );

    let outcome = match request.direction {
        ScanDirection::TowardsNewer => {
            scan_towards_newer(state, store, owner_id, request, &start).await?
        }
        ScanDirection::TowardsOlder => {
            scan_towards_older(state, store, owner_id, request, &start).await?
        }
    };

    let page = match outcome {
        Ok(page) => page,
        Err(reason) => return Ok(desync(reason)),
    };

    debug_assert!(
        page.entries
            .windows(2)
            .all(|pair| pair[1].sequential_id() == pair[0].sequential_id() + 1),
        "scan returned non-consecutive sequential ids"
    );

    Ok(ScanResponse::Entries(page))
}

fn desync<E>(reason: DesyncReason) -> ScanResponse<E> {
    debug!(%reason, "Scan desynced");
    ScanResponse::Desync(reason)
}

/// Resolve the request cursor, or `None` if it lies past the running segment
async fn resolve_start<E: LogEntry>(
    state: &EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    request: &ScanRequest,
) -> Result<Option<ResolvedStart>, EventLogError> {
    let start = match request.start_cursor {
        Cursor::Direct(cursor) => {
            if cursor.segment_id > state.running_segment_id() {
                return Ok(None);
            }
            if cursor.segment_id >= state.oldest_available_segment_id() {
                ResolvedStart {
                    segment_id: cursor.segment_id,
                    entry_index: cursor.entry_index as usize,
                    expected_previous: cursor.previous_entry_unique_id,
                }
            } else {
                // Culled from under the reader: resume at what is left.
                ResolvedStart {
                    segment_id: state.oldest_available_segment_id(),
                    entry_index: 0,
                    expected_previous: None,
                }
            }
        }
        Cursor::OnePastNewest => ResolvedStart {
            segment_id: state.running_segment_id(),
            entry_index: state.latest_segment_entries().len(),
            expected_previous: None,
        },
        Cursor::Oldest => {
            let (segment_id, entry_index) = match request.start_time {
                Some(start_time) => time_range_start(state, store, owner_id, start_time).await?,
                None => (state.oldest_available_segment_id(), 0),
            };
            ResolvedStart {
                segment_id,
                entry_index,
                expected_previous: None,
            }
        }
    };
    Ok(Some(start))
}

/// Position of the oldest entry collected at or after `start_time`
///
/// Falls back to the end of the live buffer when no such entry exists.
async fn time_range_start<E: LogEntry>(
    state: &EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    start_time: DateTime<Utc>,
) -> Result<(SegmentId, usize), EventLogError> {
    let persisted = state.persisted_segment_ids();
    if let Some(segment) = store
        .try_find_first_segment_at_or_after_time(owner_id, start_time, persisted.clone())
        .await?
    {
        let payload = segment.open::<E>()?;
        if let Some(index) = first_at_or_after(&payload.entries, start_time) {
            return Ok((segment.segment_id, index));
        }
    }

    for (offset, pending) in state.pending_segments().iter().enumerate() {
        let reaches_start = pending
            .entries
            .last()
            .is_some_and(|last| last.collected_at() >= start_time);
        if reaches_start && let Some(index) = first_at_or_after(&pending.entries, start_time) {
            return Ok((persisted.end + offset as SegmentId, index));
        }
    }

    let latest = state.latest_segment_entries();
    let index = first_at_or_after(latest, start_time).unwrap_or(latest.len());
    Ok((state.running_segment_id(), index))
}

fn first_at_or_after<E: LogEntry>(entries: &[E], time: DateTime<Utc>) -> Option<usize> {
    entries.iter().position(|entry| entry.collected_at() >= time)
}

fn direct_cursor(segment_id: SegmentId, entry_index: usize, previous: EntryUniqueId) -> DirectCursor {
    DirectCursor::new(segment_id, entry_index as EntryIndex, Some(previous))
}

/// Compare the caller's continuity value against the log; zero on either side skips the check
fn is_continuous(expected: Option<EntryUniqueId>, actual: EntryUniqueId) -> bool {
    match expected {
        Some(expected) if !expected.is_zero() && !actual.is_zero() => expected == actual,
        _ => true,
    }
}

async fn scan_towards_newer<E: LogEntry>(
    state: &EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    request: &ScanRequest,
    start: &ResolvedStart,
) -> Result<Result<ScanPage<E>, DesyncReason>, EventLogError> {
    let mut entries = Vec::new();
    let mut segment_id = start.segment_id;
    let mut index = start.entry_index;
    let mut start_previous = None;

    let continuation_previous = loop {
        let segment = segment_view(state, store, owner_id, segment_id).await?;

        if index > segment.len() {
            return Ok(Err(DesyncReason::CursorTooAdvanced));
        }

        if start_previous.is_none() {
            let actual = segment.unique_id_preceding(index);
            if !is_continuous(start.expected_previous, actual) {
                return Ok(Err(DesyncReason::MismatchedEntryAtCursor));
            }
            start_previous = Some(actual);
        }

        let mut reached_end_time = false;
        while entries.len() < request.num_entries && index < segment.len() {
            let entry = &segment.entries()[index];
            if request.end_time.is_some_and(|end| entry.collected_at() >= end) {
                reached_end_time = true;
                break;
            }
            entries.push(entry.clone());
            index += 1;
        }

        let previous = segment.unique_id_preceding(index);

        if entries.len() >= request.num_entries
            || segment_id >= state.running_segment_id()
            || reached_end_time
        {
            break previous;
        }

        segment_id += 1;
        index = 0;
    };

    Ok(Ok(ScanPage {
        entries,
        start_cursor: direct_cursor(
            start.segment_id,
            start.entry_index,
            start_previous.unwrap_or(EntryUniqueId::ZERO),
        ),
        continuation_cursor: direct_cursor(segment_id, index, continuation_previous),
    }))
}

async fn scan_towards_older<E: LogEntry>(
    state: &EventLogState<E>,
    store: &dyn SegmentStore,
    owner_id: &OwnerId,
    request: &ScanRequest,
    start: &ResolvedStart,
) -> Result<Result<ScanPage<E>, DesyncReason>, EventLogError> {
    let mut entries = Vec::new();
    let mut segment_id = start.segment_id;
    // Exclusive upper bound; `None` means the whole segment, resolved once fetched
    let mut upper: Option<usize> = Some(start.entry_index);
    let mut start_previous = None;

    let (index, continuation_previous) = loop {
        let segment = segment_view(state, store, owner_id, segment_id).await?;
        let mut index = upper.unwrap_or(segment.len());

        if index > segment.len() {
            return Ok(Err(DesyncReason::CursorTooAdvanced));
        }

        if start_previous.is_none() {
            let actual = segment.unique_id_preceding(index);
            if !is_continuous(start.expected_previous, actual) {
                return Ok(Err(DesyncReason::MismatchedEntryAtCursor));
            }
            start_previous = Some(actual);
        }

        while entries.len() < request.num_entries && index > 0 {
            entries.push(segment.entries()[index - 1].clone());
            index -= 1;
        }

        let previous = segment.unique_id_preceding(index);

        if entries.len() >= request.num_entries
            || segment_id <= state.oldest_available_segment_id()
        {
            break (index, previous);
        }

        segment_id -= 1;
        upper = None;
    };

    entries.reverse();

    Ok(Ok(ScanPage {
        entries,
        start_cursor: direct_cursor(
            start.segment_id,
            start.entry_index,
            start_previous.unwrap_or(EntryUniqueId::ZERO),
        ),
        continuation_cursor: direct_cursor(segment_id, index, continuation_previous),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flush::flush;
    use chrono::TimeDelta;
    use seglog_core::{BytesEntry, RetentionConfig};
    use seglog_storage::InMemorySegmentStore;

    fn unique(sequential_id: u64) -> EntryUniqueId {
        EntryUniqueId::new(0xABC0_0000 + sequential_id as u128)
    }

    fn build_state(count: u64, segment_size: usize, base: DateTime<Utc>) -> EventLogState<BytesEntry> {
        let config = RetentionConfig::default().with_segment_size(segment_size);
        let mut state = EventLogState::new();
        for i in 0..count {
            let at = base + TimeDelta::seconds(i as i64);
            state.append(&config, at, unique(i), |header| {
                BytesEntry::new(header, "scan", Vec::new())
            });
        }
        state
    }

    fn ids(response: &ScanResponse<BytesEntry>) -> Vec<u64> {
        response.entries().iter().map(|e| e.sequential_id()).collect()
    }

    #[tokio::test]
    async fn test_forward_from_oldest_spans_pending_and_live() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(25, 10, Utc::now());

        let response = scan(&state, &store, &owner, &ScanRequest::forward(Cursor::Oldest, 100))
            .await
            .unwrap();
        assert_eq!(ids(&response), (0..25).collect::<Vec<_>>());

        let page = response.page().unwrap();
        assert_eq!(page.start_cursor, DirectCursor::new(0, 0, Some(EntryUniqueId::ZERO)));
        assert_eq!(page.continuation_cursor, DirectCursor::new(2, 5, Some(unique(24))));
    }

    #[tokio::test]
    async fn test_backward_crosses_persisted_boundary() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let mut state = build_state(25, 10, Utc::now());
        flush(&mut state, &store, &owner, Utc::now()).await.unwrap();

        let response = scan(&state, &store, &owner, &ScanRequest::backward(Cursor::OnePastNewest, 12))
            .await
            .unwrap();
        assert_eq!(ids(&response), (13..25).collect::<Vec<_>>());
        assert_eq!(
            response.page().unwrap().continuation_cursor,
            DirectCursor::new(1, 3, Some(unique(12)))
        );
    }

    #[tokio::test]
    async fn test_backward_stops_at_oldest() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(7, 3, Utc::now());

        let response = scan(&state, &store, &owner, &ScanRequest::backward(Cursor::OnePastNewest, 50))
            .await
            .unwrap();
        assert_eq!(ids(&response), (0..7).collect::<Vec<_>>());
        assert_eq!(
            response.page().unwrap().continuation_cursor,
            DirectCursor::new(0, 0, Some(EntryUniqueId::ZERO))
        );
    }

    #[tokio::test]
    async fn test_zero_entries_resolves_cursor_only() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(12, 5, Utc::now());

        let response = scan(&state, &store, &owner, &ScanRequest::forward(Cursor::OnePastNewest, 0))
            .await
            .unwrap();
        let page = response.page().unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.start_cursor, DirectCursor::new(2, 2, Some(unique(11))));
        assert_eq!(page.continuation_cursor, page.start_cursor);
    }

    #[tokio::test]
    async fn test_segment_past_running_is_too_advanced() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(12, 5, Utc::now());

        let request = ScanRequest::forward(DirectCursor::at(3, 0), 5);
        let response = scan(&state, &store, &owner, &request).await.unwrap();
        assert_eq!(response, ScanResponse::Desync(DesyncReason::CursorTooAdvanced));
    }

    #[tokio::test]
    async fn test_index_past_segment_end_is_too_advanced() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(12, 5, Utc::now());

        for request in [
            ScanRequest::forward(DirectCursor::at(2, 3), 5),
            ScanRequest::backward(DirectCursor::at(0, 6), 5),
        ] {
            let response = scan(&state, &store, &owner, &request).await.unwrap();
            assert_eq!(response.desync_description(), Some("Cursor too advanced"));
        }
    }

    #[tokio::test]
    async fn test_zero_continuity_skips_check() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(12, 5, Utc::now());

        let request = ScanRequest::forward(DirectCursor::new(1, 2, Some(EntryUniqueId::ZERO)), 3);
        let response = scan(&state, &store, &owner, &request).await.unwrap();
        assert_eq!(ids(&response), vec![7, 8, 9]);

        let request = ScanRequest::forward(DirectCursor::new(1, 2, Some(unique(6))), 3);
        let response = scan(&state, &store, &owner, &request).await.unwrap();
        assert_eq!(ids(&response), vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_continuity_checked_against_back_link() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(12, 5, Utc::now());

        let ok = ScanRequest::backward(DirectCursor::new(2, 0, Some(unique(9))), 2);
        let response = scan(&state, &store, &owner, &ok).await.unwrap();
        assert_eq!(ids(&response), vec![8, 9]);

        let stale = ScanRequest::backward(DirectCursor::new(2, 0, Some(unique(99))), 2);
        let response = scan(&state, &store, &owner, &stale).await.unwrap();
        assert_eq!(response, ScanResponse::Desync(DesyncReason::MismatchedEntryAtCursor));
    }

    #[tokio::test]
    async fn test_time_range_start_in_each_tier() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let base = Utc::now();
        // Segments 0..=1 persisted, 2..=3 pending, live holds 20..=22
        let mut state = build_state(10, 5, base);
        flush(&mut state, &store, &owner, base).await.unwrap();
        let config = RetentionConfig::default().with_segment_size(5);
        for i in 10..23u64 {
            state.append(&config, base + TimeDelta::seconds(i as i64), unique(i), |header| {
                BytesEntry::new(header, "scan", Vec::new())
            });
        }

        for (offset, expected) in [(0, (0, 0)), (7, (1, 2)), (13, (2, 3)), (21, (4, 1)), (99, (4, 3))] {
            let at = base + TimeDelta::seconds(offset);
            let resolved = time_range_start(&state, &store, &owner, at).await.unwrap();
            assert_eq!(resolved, expected, "start offset {offset}");
        }
    }

    #[tokio::test]
    async fn test_end_time_stops_forward_scan() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let base = Utc::now();
        let state = build_state(20, 4, base);

        let request = ScanRequest::forward(Cursor::Oldest, 100)
            .with_start_time(base + TimeDelta::seconds(3))
            .with_end_time(base + TimeDelta::seconds(9));
        let response = scan(&state, &store, &owner, &request).await.unwrap();
        assert_eq!(ids(&response), vec![3, 4, 5, 6, 7, 8]);
        assert_eq!(
            response.page().unwrap().continuation_cursor,
            DirectCursor::new(2, 1, Some(unique(8)))
        );
    }

    #[tokio::test]
    async fn test_invalid_request_rejected() {
        let store = InMemorySegmentStore::new();
        let owner = OwnerId::from("o");
        let state = build_state(3, 5, Utc::now());

        let request = ScanRequest::backward(Cursor::Oldest, 1).with_start_time(Utc::now());
        let result = scan(&state, &store, &owner, &request).await;
        assert!(matches!(result, Err(EventLogError::InvalidRequest(_))));
    }
}
