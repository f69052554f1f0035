//! redb-backed segment store
//!
//! Two tables share one key layout,
//! `owner length (u32 BE) ‖ owner bytes ‖ segment id (u32 BE)`, so an
//! owner's segments are contiguous and ordered by id, and no owner's keys
//! fall inside another owner's range:
//!
//! - `segments`: postcard-encoded [`PersistedSegment`]
//! - `segment_meta`: postcard-encoded [`SegmentSummary`], read by timestamp
//!   lookups and listings without touching payload bytes

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use seglog_core::{
    OwnerId, PersistedSegment, SegmentId, SegmentKey, SegmentStore, SegmentSummary, StorageError,
};
use tracing::{debug, info, instrument, trace};

// Key: segment key, Value: serialized PersistedSegment
const SEGMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("segments");

// Key: segment key, Value: serialized SegmentSummary
const SEGMENT_META: TableDefinition<&[u8], &[u8]> = TableDefinition::new("segment_meta");

/// Configuration for the redb segment store
#[derive(Debug, Clone)]
pub struct RedbStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/seglog.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl RedbStoreConfig {
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }
}

/// Durable SegmentStore on a single redb file
pub struct RedbSegmentStore {
    db: Arc<Database>,
    config: RedbStoreConfig,
}

fn db_err(err: impl ToString) -> StorageError {
    StorageError::database(err.to_string())
}

fn owner_prefix(owner_id: &OwnerId) -> Vec<u8> {
    let owner = owner_id.as_bytes();
    let mut prefix = Vec::with_capacity(4 + owner.len() + 4);
    prefix.extend_from_slice(&(owner.len() as u32).to_be_bytes());
    prefix.extend_from_slice(owner);
    prefix
}

fn segment_key_bytes(owner_id: &OwnerId, segment_id: SegmentId) -> Vec<u8> {
    let mut key = owner_prefix(owner_id);
    key.extend_from_slice(&segment_id.to_be_bytes());
    key
}

impl RedbSegmentStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStoreConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(db_err)?;

        info!("Opened redb segment store");

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        write_txn.open_table(SEGMENTS).map_err(db_err)?;
        write_txn.open_table(SEGMENT_META).map_err(db_err)?;
        write_txn.commit().map_err(db_err)?;

        debug!("Initialized segment tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStoreConfig {
        &self.config
    }

    fn read_meta(&self, key: &[u8]) -> Result<Option<SegmentSummary>, StorageError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(SEGMENT_META).map_err(db_err)?;
        match table.get(key).map_err(db_err)? {
            Some(value) => Ok(Some(postcard::from_bytes(value.value())?)),
            None => Ok(None),
        }
    }

    /// Summaries with keys in `[start, end]`, ascending
    fn scan_meta(&self, start: &[u8], end: &[u8]) -> Result<Vec<SegmentSummary>, StorageError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(SEGMENT_META).map_err(db_err)?;

        let mut results = Vec::new();
        for entry in table.range(start..=end).map_err(db_err)? {
            let (_, value) = entry.map_err(db_err)?;
            results.push(postcard::from_bytes(value.value())?);
        }
        Ok(results)
    }

    /// Inclusive bounds covering every segment id of one owner
    fn owner_key_range(owner_id: &OwnerId) -> (Vec<u8>, Vec<u8>) {
        (
            segment_key_bytes(owner_id, SegmentId::MIN),
            segment_key_bytes(owner_id, SegmentId::MAX),
        )
    }
}

#[async_trait]
impl SegmentStore for RedbSegmentStore {
    async fn upsert(&self, segment: PersistedSegment) -> Result<(), StorageError> {
        let key = segment_key_bytes(&segment.owner_id, segment.segment_id);
        let record = postcard::to_allocvec(&segment)
            .map_err(|e| StorageError::serialization(e.to_string()))?;
        let meta = postcard::to_allocvec(&segment.summary())
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut segments = write_txn.open_table(SEGMENTS).map_err(db_err)?;
            segments
                .insert(key.as_slice(), record.as_slice())
                .map_err(db_err)?;
            let mut meta_table = write_txn.open_table(SEGMENT_META).map_err(db_err)?;
            meta_table
                .insert(key.as_slice(), meta.as_slice())
                .map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;

        trace!(owner = %segment.owner_id, segment_id = segment.segment_id, bytes = record.len(), "Upserted segment");
        Ok(())
    }

    async fn try_get_last_entry_timestamp(
        &self,
        key: &SegmentKey,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let key = segment_key_bytes(&key.owner_id, key.segment_id);
        Ok(self.read_meta(&key)?.map(|meta| meta.last_entry_timestamp))
    }

    async fn remove(&self, key: &SegmentKey) -> Result<bool, StorageError> {
        let key = segment_key_bytes(&key.owner_id, key.segment_id);

        let write_txn = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut segments = write_txn.open_table(SEGMENTS).map_err(db_err)?;
            let mut meta_table = write_txn.open_table(SEGMENT_META).map_err(db_err)?;
            meta_table.remove(key.as_slice()).map_err(db_err)?;
            segments.remove(key.as_slice()).map_err(db_err)?.is_some()
        };
        write_txn.commit().map_err(db_err)?;

        Ok(removed)
    }

    async fn remove_all_for_owner(&self, owner_id: &OwnerId) -> Result<usize, StorageError> {
        let (start, end) = Self::owner_key_range(owner_id);

        let write_txn = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut segments = write_txn.open_table(SEGMENTS).map_err(db_err)?;
            let mut meta_table = write_txn.open_table(SEGMENT_META).map_err(db_err)?;

            let keys: Vec<Vec<u8>> = segments
                .range(start.as_slice()..=end.as_slice())
                .map_err(db_err)?
                .map(|entry| entry.map(|(key, _)| key.value().to_vec()))
                .collect::<Result<_, _>>()
                .map_err(db_err)?;

            for key in &keys {
                segments.remove(key.as_slice()).map_err(db_err)?;
                meta_table.remove(key.as_slice()).map_err(db_err)?;
            }
            keys.len()
        };
        write_txn.commit().map_err(db_err)?;

        debug!(owner = %owner_id, removed, "Removed all segments of owner");
        Ok(removed)
    }

    async fn try_get(&self, key: &SegmentKey) -> Result<Option<PersistedSegment>, StorageError> {
        let key = segment_key_bytes(&key.owner_id, key.segment_id);

        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(SEGMENTS).map_err(db_err)?;
        match table.get(key.as_slice()).map_err(db_err)? {
            Some(value) => Ok(Some(postcard::from_bytes(value.value())?)),
            None => Ok(None),
        }
    }

    async fn try_find_first_segment_at_or_after_time(
        &self,
        owner_id: &OwnerId,
        time: DateTime<Utc>,
        segment_ids: Range<SegmentId>,
    ) -> Result<Option<PersistedSegment>, StorageError> {
        if segment_ids.is_empty() {
            return Ok(None);
        }

        let start = segment_key_bytes(owner_id, segment_ids.start);
        let end = segment_key_bytes(owner_id, segment_ids.end - 1);
        let found = self
            .scan_meta(&start, &end)?
            .into_iter()
            .find(|meta| meta.last_entry_timestamp >= time);

        match found {
            Some(meta) => {
                self.try_get(&SegmentKey::new(owner_id.clone(), meta.segment_id))
                    .await
            }
            None => Ok(None),
        }
    }

    async fn list_segments(&self, owner_id: &OwnerId) -> Result<Vec<SegmentSummary>, StorageError> {
        let (start, end) = Self::owner_key_range(owner_id);
        self.scan_meta(&start, &end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbSegmentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStoreConfig::at(temp_dir.path().join("test.redb"));
        let store = RedbSegmentStore::open(config).unwrap();
        (store, temp_dir)
    }

    fn segment(owner: &str, id: SegmentId, last_secs: i64) -> PersistedSegment {
        PersistedSegment {
            owner_id: OwnerId::from(owner),
            segment_id: id,
            payload: Bytes::from(vec![0xFF, 1, 1, id as u8]),
            first_entry_timestamp: Utc.timestamp_opt(last_secs - 5, 0).unwrap(),
            last_entry_timestamp: Utc.timestamp_opt(last_secs, 0).unwrap(),
            created_at: Utc.timestamp_opt(last_secs + 1, 0).unwrap(),
        }
    }

    #[test]
    fn test_key_layout_orders_by_segment_id() {
        let owner = OwnerId::from("a");
        assert!(segment_key_bytes(&owner, 255) < segment_key_bytes(&owner, 256));
        assert!(segment_key_bytes(&owner, 1) < segment_key_bytes(&owner, 0x0100_0000));
    }

    #[test]
    fn test_owner_range_excludes_owners_sharing_a_prefix() {
        let (start, end) = RedbSegmentStore::owner_key_range(&OwnerId::from("a"));
        for other in ["ab", "a\0b", "a\0", ""] {
            for segment_id in [0, 1, SegmentId::MAX] {
                let key = segment_key_bytes(&OwnerId::from(other), segment_id);
                assert!(
                    !(start.as_slice() <= key.as_slice() && key.as_slice() <= end.as_slice()),
                    "owner {other:?} segment {segment_id} inside range of \"a\""
                );
            }
        }
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reopen.redb");

        {
            let store = RedbSegmentStore::open(RedbStoreConfig::at(&path)).unwrap();
            store.upsert(segment("owner", 4, 1000)).await.unwrap();
        }

        let store = RedbSegmentStore::open(RedbStoreConfig::at(&path)).unwrap();
        let key = SegmentKey::new(OwnerId::from("owner"), 4);
        let fetched = store.try_get(&key).await.unwrap().unwrap();
        assert_eq!(fetched, segment("owner", 4, 1000));
    }

    #[tokio::test]
    async fn test_meta_tracks_upsert_overwrite() {
        let (store, _temp) = create_test_store();
        store.upsert(segment("owner", 0, 100)).await.unwrap();
        store.upsert(segment("owner", 0, 500)).await.unwrap();

        let key = SegmentKey::new(OwnerId::from("owner"), 0);
        assert_eq!(
            store.try_get_last_entry_timestamp(&key).await.unwrap(),
            Some(Utc.timestamp_opt(500, 0).unwrap())
        );
        assert_eq!(store.list_segments(&OwnerId::from("owner")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("store.redb");
        let store = RedbSegmentStore::open(RedbStoreConfig::at(&path)).unwrap();
        assert_eq!(store.config().db_path, path);
        assert!(path.exists());
    }
}
