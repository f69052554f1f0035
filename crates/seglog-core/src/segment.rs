//! Segment records
//!
//! [`SegmentPayload`] is the logical content of a closed segment.
//! [`PersistedSegment`] is the record written to a [`SegmentStore`](crate::SegmentStore):
//! the compressed payload plus the timestamps the store indexes on.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::CodecError;
use crate::model::{EntryUniqueId, LogEntry, OwnerId, SegmentId};

/// Primary key of a persisted segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub owner_id: OwnerId,
    pub segment_id: SegmentId,
}

impl SegmentKey {
    pub fn new(owner_id: OwnerId, segment_id: SegmentId) -> Self {
        Self {
            owner_id,
            segment_id,
        }
    }

    /// Key used to group all segments of one owner
    pub fn partition_key(&self) -> &str {
        self.owner_id.as_str()
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.segment_id)
    }
}

/// Entries of a closed segment plus the back-link to the entry before them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPayload<E> {
    pub entries: Vec<E>,
    /// Unique id of the entry preceding `entries[0]`, zero when unknown
    pub previous_segment_last_entry_unique_id: EntryUniqueId,
}

impl<E: LogEntry> SegmentPayload<E> {
    pub fn new(entries: Vec<E>, previous_segment_last_entry_unique_id: EntryUniqueId) -> Self {
        Self {
            entries,
            previous_segment_last_entry_unique_id,
        }
    }
}

/// A sealed segment as stored in a segment store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSegment {
    pub owner_id: OwnerId,
    pub segment_id: SegmentId,
    /// Versioned, compressed payload envelope
    pub payload: Bytes,
    pub first_entry_timestamp: DateTime<Utc>,
    pub last_entry_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PersistedSegment {
    /// Compress a payload into a storable record
    pub fn seal<E: LogEntry>(
        owner_id: OwnerId,
        segment_id: SegmentId,
        payload: &SegmentPayload<E>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        let (first, last) = match (payload.entries.first(), payload.entries.last()) {
            (Some(first), Some(last)) => (first.collected_at(), last.collected_at()),
            _ => return Err(CodecError::EmptySegment),
        };

        Ok(Self {
            owner_id,
            segment_id,
            payload: codec::compress_payload(payload)?,
            first_entry_timestamp: first,
            last_entry_timestamp: last,
            created_at,
        })
    }

    /// Decode the stored payload, in either envelope form
    pub fn open<E: LogEntry>(&self) -> Result<SegmentPayload<E>, CodecError> {
        codec::decompress_payload(&self.payload)
    }

    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(self.owner_id.clone(), self.segment_id)
    }

    /// `"{owner}/{segment}"`
    pub fn global_id(&self) -> String {
        self.key().to_string()
    }

    pub fn summary(&self) -> SegmentSummary {
        SegmentSummary {
            segment_id: self.segment_id,
            first_entry_timestamp: self.first_entry_timestamp,
            last_entry_timestamp: self.last_entry_timestamp,
            created_at: self.created_at,
            payload_size: self.payload.len(),
        }
    }
}

/// Metadata of a persisted segment, without its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment_id: SegmentId,
    pub first_entry_timestamp: DateTime<Utc>,
    pub last_entry_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub payload_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BytesEntry, EntryHeader};
    use chrono::TimeZone;

    fn entry(id: u64, secs: i64) -> BytesEntry {
        BytesEntry::new(
            EntryHeader::new(
                id,
                Utc.timestamp_opt(secs, 0).unwrap(),
                EntryUniqueId::new(1000 + id as u128),
            ),
            "test",
            vec![id as u8; 4],
        )
    }

    #[test]
    fn test_key_format() {
        let key = SegmentKey::new(OwnerId::from("Player:42"), 7);
        assert_eq!(key.to_string(), "Player:42/7");
        assert_eq!(key.partition_key(), "Player:42");
    }

    #[test]
    fn test_seal_and_open() {
        let payload = SegmentPayload::new(
            vec![entry(10, 100), entry(11, 105), entry(12, 109)],
            EntryUniqueId::new(1009),
        );
        let created = Utc.timestamp_opt(200, 0).unwrap();
        let sealed = PersistedSegment::seal(OwnerId::from("a"), 3, &payload, created).unwrap();

        assert_eq!(sealed.global_id(), "a/3");
        assert_eq!(sealed.first_entry_timestamp, Utc.timestamp_opt(100, 0).unwrap());
        assert_eq!(sealed.last_entry_timestamp, Utc.timestamp_opt(109, 0).unwrap());
        assert_eq!(sealed.created_at, created);

        let opened: SegmentPayload<BytesEntry> = sealed.open().unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn test_seal_rejects_empty_segment() {
        let payload: SegmentPayload<BytesEntry> = SegmentPayload::new(Vec::new(), EntryUniqueId::ZERO);
        let result = PersistedSegment::seal(OwnerId::from("a"), 0, &payload, Utc::now());
        assert!(matches!(result, Err(CodecError::EmptySegment)));
    }
}
