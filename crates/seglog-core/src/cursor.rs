//! Cursors into a segmented event log
//!
//! A cursor is either symbolic ([`Cursor::OnePastNewest`], [`Cursor::Oldest`])
//! or concrete ([`Cursor::Direct`]). Only concrete cursors are handed back to
//! readers, as the resolved start and continuation positions of a scan.
//!
//! ## Textual form
//!
//! | Text | Cursor |
//! |------|--------|
//! | `$newest` | `OnePastNewest` |
//! | `$oldest` | `Oldest` |
//! | `12_4` | `Direct` at segment 12, index 4, no continuity value |
//! | `12_4_<HIGH>-<LOW>` | `Direct` with the preceding entry's unique id |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CursorParseError;
use crate::model::{EntryIndex, EntryUniqueId, SegmentId};

const NEWEST_TOKEN: &str = "$newest";
const OLDEST_TOKEN: &str = "$oldest";

/// Concrete position: just before entry `entry_index` of segment `segment_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectCursor {
    pub segment_id: SegmentId,
    pub entry_index: EntryIndex,
    /// Unique id of the entry immediately preceding this position, if known
    pub previous_entry_unique_id: Option<EntryUniqueId>,
}

impl DirectCursor {
    pub fn new(
        segment_id: SegmentId,
        entry_index: EntryIndex,
        previous_entry_unique_id: Option<EntryUniqueId>,
    ) -> Self {
        Self {
            segment_id,
            entry_index,
            previous_entry_unique_id,
        }
    }

    /// Cursor without a continuity value
    pub fn at(segment_id: SegmentId, entry_index: EntryIndex) -> Self {
        Self::new(segment_id, entry_index, None)
    }
}

impl fmt::Display for DirectCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.segment_id, self.entry_index)?;
        if let Some(previous) = self.previous_entry_unique_id {
            write!(f, "_{previous}")?;
        }
        Ok(())
    }
}

/// Start position of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cursor {
    Direct(DirectCursor),
    /// Just past the newest entry at the time of the scan
    OnePastNewest,
    /// The oldest entry still retained (or the first at or after a start time)
    Oldest,
}

impl From<DirectCursor> for Cursor {
    fn from(cursor: DirectCursor) -> Self {
        Cursor::Direct(cursor)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Direct(direct) => write!(f, "{direct}"),
            Cursor::OnePastNewest => f.write_str(NEWEST_TOKEN),
            Cursor::Oldest => f.write_str(OLDEST_TOKEN),
        }
    }
}

impl FromStr for Cursor {
    type Err = CursorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(CursorParseError::Empty),
            NEWEST_TOKEN => Ok(Cursor::OnePastNewest),
            OLDEST_TOKEN => Ok(Cursor::Oldest),
            _ => s.parse::<DirectCursor>().map(Cursor::Direct),
        }
    }
}

impl FromStr for DirectCursor {
    type Err = CursorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CursorParseError::Empty);
        }

        let parts: Vec<&str> = s.split('_').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(CursorParseError::PartCount(s.to_string()));
        }

        let segment_id = parts[0]
            .parse::<SegmentId>()
            .map_err(|_| CursorParseError::SegmentId(parts[0].to_string()))?;
        let entry_index = parts[1]
            .parse::<EntryIndex>()
            .map_err(|_| CursorParseError::EntryIndex(parts[1].to_string()))?;
        let previous_entry_unique_id = match parts.get(2) {
            Some(text) => Some(text.parse::<EntryUniqueId>()?),
            None => None,
        };

        Ok(DirectCursor::new(
            segment_id,
            entry_index,
            previous_entry_unique_id,
        ))
    }
}
