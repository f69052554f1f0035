//! Entry model
//!
//! Owners, segment and entry identifiers, and the [`EntryHeader`] that every
//! entry type carries. The engine is generic over [`LogEntry`], so payload
//! types are supplied by the application.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::InvalidUniqueId;

/// Sequential id of a segment within one owner's log
pub type SegmentId = u32;

/// Position of an entry within a segment
pub type EntryIndex = u32;

/// Identity of the single writer that owns a log
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// 128-bit id used only to validate cursor continuity
///
/// [`EntryUniqueId::ZERO`] means "unknown" and disables the continuity
/// check wherever it appears.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct EntryUniqueId(u128);

impl EntryUniqueId {
    pub const ZERO: Self = Self(0);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn from_parts(high: u64, low: u64) -> Self {
        Self(((high as u128) << 64) | low as u128)
    }

    /// Random id, suitable for tagging freshly collected entries
    pub fn random() -> Self {
        Self(rand::random::<u128>())
    }

    pub const fn high(&self) -> u64 {
        (self.0 >> 64) as u64
    }

    pub const fn low(&self) -> u64 {
        self.0 as u64
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntryUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}-{:016X}", self.high(), self.low())
    }
}

impl FromStr for EntryUniqueId {
    type Err = InvalidUniqueId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidUniqueId(s.to_string());
        let (high, low) = s.split_once('-').ok_or_else(invalid)?;
        let parse_half = |part: &str| {
            if part.is_empty() || part.len() > 16 {
                return Err(invalid());
            }
            u64::from_str_radix(part, 16).map_err(|_| invalid())
        };
        Ok(Self::from_parts(parse_half(high)?, parse_half(low)?))
    }
}

/// Fields assigned by the log when an entry is appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Gapless, per-owner, assigned at append time
    pub sequential_id: u64,
    pub collected_at: DateTime<Utc>,
    pub unique_id: EntryUniqueId,
}

impl EntryHeader {
    pub fn new(sequential_id: u64, collected_at: DateTime<Utc>, unique_id: EntryUniqueId) -> Self {
        Self {
            sequential_id,
            collected_at,
            unique_id,
        }
    }
}

/// An entry type that can be stored in a segmented event log
pub trait LogEntry: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn header(&self) -> &EntryHeader;

    fn sequential_id(&self) -> u64 {
        self.header().sequential_id
    }

    fn collected_at(&self) -> DateTime<Utc> {
        self.header().collected_at
    }

    fn unique_id(&self) -> EntryUniqueId {
        self.header().unique_id
    }
}

/// Stock entry with an application-defined kind tag and opaque payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesEntry {
    pub header: EntryHeader,
    pub kind: String,
    pub payload: Bytes,
}

impl BytesEntry {
    pub fn new(header: EntryHeader, kind: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

impl LogEntry for BytesEntry {
    fn header(&self) -> &EntryHeader {
        &self.header
    }
}
