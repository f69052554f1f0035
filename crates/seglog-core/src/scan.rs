//! Scan protocol types
//!
//! A [`ScanRequest`] names a start cursor, a direction and an entry budget,
//! optionally narrowed by a time range. The answer is a [`ScanResponse`]:
//! either a page of entries with concrete cursors, or a desync when the
//! cursor no longer matches the log's history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, DirectCursor};
use crate::error::InvalidScanRequest;

/// Upper bound on entries returned by a single scan
pub const MAX_ENTRIES_PER_SCAN: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanDirection {
    TowardsNewer,
    TowardsOlder,
}

/// Request to read a contiguous run of entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub start_cursor: Cursor,
    pub num_entries: usize,
    pub direction: ScanDirection,
    /// Inclusive lower time bound, only honored with [`Cursor::Oldest`]
    pub start_time: Option<DateTime<Utc>>,
    /// Exclusive upper time bound
    pub end_time: Option<DateTime<Utc>>,
}

impl ScanRequest {
    pub fn new(start_cursor: impl Into<Cursor>, num_entries: usize, direction: ScanDirection) -> Self {
        Self {
            start_cursor: start_cursor.into(),
            num_entries,
            direction,
            start_time: None,
            end_time: None,
        }
    }

    pub fn forward(start_cursor: impl Into<Cursor>, num_entries: usize) -> Self {
        Self::new(start_cursor, num_entries, ScanDirection::TowardsNewer)
    }

    pub fn backward(start_cursor: impl Into<Cursor>, num_entries: usize) -> Self {
        Self::new(start_cursor, num_entries, ScanDirection::TowardsOlder)
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn has_time_filter(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }

    /// Reject requests that can never be served
    pub fn validate(&self) -> Result<(), InvalidScanRequest> {
        if self.has_time_filter() && self.direction != ScanDirection::TowardsNewer {
            return Err(InvalidScanRequest::TimeFilterRequiresForward);
        }
        if self.num_entries > MAX_ENTRIES_PER_SCAN {
            return Err(InvalidScanRequest::TooManyEntries {
                requested: self.num_entries,
                max: MAX_ENTRIES_PER_SCAN,
            });
        }
        Ok(())
    }
}

/// Why a scan could not be served from the given cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesyncReason {
    /// The cursor points past anything the log has produced
    CursorTooAdvanced,
    /// The entry before the cursor is not the one the reader last saw
    MismatchedEntryAtCursor,
}

impl DesyncReason {
    pub fn description(&self) -> &'static str {
        match self {
            DesyncReason::CursorTooAdvanced => "Cursor too advanced",
            DesyncReason::MismatchedEntryAtCursor => "Mismatched entry at cursor",
        }
    }
}

impl fmt::Display for DesyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Entries returned by a successful scan, always ordered oldest to newest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPage<E> {
    pub entries: Vec<E>,
    /// Where the scan actually started, resolved from the request cursor
    pub start_cursor: DirectCursor,
    /// Where the next scan in the same direction should start
    pub continuation_cursor: DirectCursor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanResponse<E> {
    Entries(ScanPage<E>),
    Desync(DesyncReason),
}

impl<E> ScanResponse<E> {
    pub fn failed_with_desync(&self) -> bool {
        matches!(self, ScanResponse::Desync(_))
    }

    pub fn desync_description(&self) -> Option<&'static str> {
        match self {
            ScanResponse::Desync(reason) => Some(reason.description()),
            ScanResponse::Entries(_) => None,
        }
    }

    /// Entries of the page, empty on desync
    pub fn entries(&self) -> &[E] {
        match self {
            ScanResponse::Entries(page) => &page.entries,
            ScanResponse::Desync(_) => &[],
        }
    }

    pub fn page(&self) -> Option<&ScanPage<E>> {
        match self {
            ScanResponse::Entries(page) => Some(page),
            ScanResponse::Desync(_) => None,
        }
    }

    pub fn into_page(self) -> Option<ScanPage<E>> {
        match self {
            ScanResponse::Entries(page) => Some(page),
            ScanResponse::Desync(_) => None,
        }
    }
}
