//! Backend conformance tests
//!
//! Every check runs against both the in-memory and the redb store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use seglog_core::{OwnerId, PersistedSegment, SegmentId, SegmentKey, SegmentStore};
use seglog_storage::{InMemorySegmentStore, RedbSegmentStore, RedbStoreConfig};
use tempfile::TempDir;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn segment(owner: &str, id: SegmentId, first: i64, last: i64) -> PersistedSegment {
    PersistedSegment {
        owner_id: OwnerId::from(owner),
        segment_id: id,
        payload: Bytes::from(format!("payload-{owner}-{id}").into_bytes()),
        first_entry_timestamp: ts(first),
        last_entry_timestamp: ts(last),
        created_at: ts(last + 1),
    }
}

fn key(owner: &str, id: SegmentId) -> SegmentKey {
    SegmentKey::new(OwnerId::from(owner), id)
}

/// Run the body once per backend
async fn for_each_backend<F, Fut>(body: F)
where
    F: Fn(Arc<dyn SegmentStore>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    body(Arc::new(InMemorySegmentStore::new())).await;

    let temp_dir = TempDir::new().unwrap();
    let redb = RedbSegmentStore::open(RedbStoreConfig::at(temp_dir.path().join("c.redb"))).unwrap();
    body(Arc::new(redb)).await;
}

// ============================================================================
// Basic operations
// ============================================================================

#[tokio::test]
async fn test_upsert_then_get() {
    for_each_backend(|store| async move {
        let original = segment("alice", 0, 0, 10);
        store.upsert(original.clone()).await.unwrap();

        assert_eq!(store.try_get(&key("alice", 0)).await.unwrap(), Some(original));
        assert_eq!(store.try_get(&key("alice", 1)).await.unwrap(), None);
        assert_eq!(store.try_get(&key("bob", 0)).await.unwrap(), None);
    })
    .await;
}

#[tokio::test]
async fn test_upsert_overwrites() {
    for_each_backend(|store| async move {
        store.upsert(segment("alice", 2, 0, 10)).await.unwrap();
        let replacement = segment("alice", 2, 50, 60);
        store.upsert(replacement.clone()).await.unwrap();

        assert_eq!(store.try_get(&key("alice", 2)).await.unwrap(), Some(replacement));
        assert_eq!(store.list_segments(&OwnerId::from("alice")).await.unwrap().len(), 1);
    })
    .await;
}

#[tokio::test]
async fn test_last_entry_timestamp() {
    for_each_backend(|store| async move {
        store.upsert(segment("alice", 0, 0, 42)).await.unwrap();

        assert_eq!(
            store.try_get_last_entry_timestamp(&key("alice", 0)).await.unwrap(),
            Some(ts(42))
        );
        assert_eq!(
            store.try_get_last_entry_timestamp(&key("alice", 9)).await.unwrap(),
            None
        );
    })
    .await;
}

#[tokio::test]
async fn test_remove_reports_existence() {
    for_each_backend(|store| async move {
        store.upsert(segment("alice", 0, 0, 1)).await.unwrap();

        assert!(store.remove(&key("alice", 0)).await.unwrap());
        assert!(!store.remove(&key("alice", 0)).await.unwrap());
        assert_eq!(store.try_get(&key("alice", 0)).await.unwrap(), None);
        assert_eq!(
            store.try_get_last_entry_timestamp(&key("alice", 0)).await.unwrap(),
            None
        );
    })
    .await;
}

// ============================================================================
// Owner-wide operations
// ============================================================================

#[tokio::test]
async fn test_remove_all_for_owner_leaves_other_owners() {
    for_each_backend(|store| async move {
        for id in 0..5 {
            store.upsert(segment("alice", id, 0, 1)).await.unwrap();
        }
        store.upsert(segment("alicia", 0, 0, 1)).await.unwrap();
        store.upsert(segment("bob", 0, 0, 1)).await.unwrap();

        assert_eq!(store.remove_all_for_owner(&OwnerId::from("alice")).await.unwrap(), 5);
        assert!(store.list_segments(&OwnerId::from("alice")).await.unwrap().is_empty());
        assert_eq!(store.list_segments(&OwnerId::from("alicia")).await.unwrap().len(), 1);
        assert_eq!(store.list_segments(&OwnerId::from("bob")).await.unwrap().len(), 1);

        assert_eq!(store.remove_all_for_owner(&OwnerId::from("alice")).await.unwrap(), 0);
    })
    .await;
}

#[tokio::test]
async fn test_owner_ids_with_nul_stay_separate() {
    for_each_backend(|store| async move {
        store.upsert(segment("a", 0, 0, 1)).await.unwrap();
        store.upsert(segment("a\0b", 0, 0, 1)).await.unwrap();
        store.upsert(segment("a\0", 7, 0, 1)).await.unwrap();

        assert_eq!(store.list_segments(&OwnerId::from("a")).await.unwrap().len(), 1);
        assert_eq!(
            store
                .try_find_first_segment_at_or_after_time(&OwnerId::from("a"), ts(0), 0..SegmentId::MAX)
                .await
                .unwrap()
                .map(|s| s.owner_id),
            Some(OwnerId::from("a"))
        );

        assert_eq!(store.remove_all_for_owner(&OwnerId::from("a")).await.unwrap(), 1);
        assert!(store.try_get(&key("a\0b", 0)).await.unwrap().is_some());
        assert!(store.try_get(&key("a\0", 7)).await.unwrap().is_some());
        assert_eq!(store.list_segments(&OwnerId::from("a\0b")).await.unwrap().len(), 1);
    })
    .await;
}

#[tokio::test]
async fn test_list_segments_is_ordered() {
    for_each_backend(|store| async move {
        for id in [300, 2, 70, 1000] {
            store.upsert(segment("alice", id, 0, id as i64)).await.unwrap();
        }

        let ids: Vec<SegmentId> = store
            .list_segments(&OwnerId::from("alice"))
            .await
            .unwrap()
            .into_iter()
            .map(|summary| summary.segment_id)
            .collect();
        assert_eq!(ids, vec![2, 70, 300, 1000]);
    })
    .await;
}

// ============================================================================
// Time lookup
// ============================================================================

#[tokio::test]
async fn test_find_first_segment_at_or_after_time() {
    for_each_backend(|store| async move {
        // segment i covers [10i, 10i + 9]
        for id in 0..6u32 {
            let base = id as i64 * 10;
            store.upsert(segment("alice", id, base, base + 9)).await.unwrap();
        }
        let owner = OwnerId::from("alice");

        let found = store
            .try_find_first_segment_at_or_after_time(&owner, ts(25), 0..6)
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.segment_id), Some(2));

        // Exact match on a last-entry timestamp
        let found = store
            .try_find_first_segment_at_or_after_time(&owner, ts(29), 0..6)
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.segment_id), Some(2));

        // Range start excludes earlier candidates
        let found = store
            .try_find_first_segment_at_or_after_time(&owner, ts(0), 3..6)
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.segment_id), Some(3));

        // Range end is exclusive
        let found = store
            .try_find_first_segment_at_or_after_time(&owner, ts(55), 0..5)
            .await
            .unwrap();
        assert!(found.is_none());

        // Empty range
        let found = store
            .try_find_first_segment_at_or_after_time(&owner, ts(0), 4..4)
            .await
            .unwrap();
        assert!(found.is_none());

        // Past everything
        let found = store
            .try_find_first_segment_at_or_after_time(&owner, ts(1000), 0..6)
            .await
            .unwrap();
        assert!(found.is_none());
    })
    .await;
}

#[tokio::test]
async fn test_concurrent_owners() {
    for_each_backend(|store| async move {
        let mut handles = Vec::new();
        for owner in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let name = format!("owner-{owner}");
                for id in 0..10 {
                    store.upsert(segment(&name, id, 0, id as i64)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for owner in 0..8 {
            let listed = store
                .list_segments(&OwnerId::new(format!("owner-{owner}")))
                .await
                .unwrap();
            assert_eq!(listed.len(), 10);
        }
    })
    .await;
}
