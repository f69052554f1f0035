//! Per-owner event log facade
//!
//! [`EventLog`] bundles one owner's [`EventLogState`] with the collaborators
//! every operation needs: the segment store, a clock, the retention config
//! and a [`StatePersister`]. Operations take `&mut self` for mutation and
//! `&self` for scans, which is how single-writer ownership is expressed.
//!
//! ## Example
//!
//! ```ignore
//! let store = Arc::new(InMemorySegmentStore::new());
//! let mut log = EventLog::<BytesEntry>::new("player-1", RetentionConfig::default(), store)?;
//!
//! log.append(EntryUniqueId::random(), |header| BytesEntry::new(header, "login", vec![]));
//! log.flush_and_cull().await?;
//!
//! let page = log.scan(&ScanRequest::forward(Cursor::Oldest, 100)).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use seglog_core::{
    Clock, EntryHeader, EntryUniqueId, LogEntry, OwnerId, RetentionConfig, ScanRequest,
    ScanResponse, SegmentStore, SystemClock,
};
use tracing::{info, instrument, warn};

use crate::error::EventLogError;
use crate::retention::{NoopPersister, StatePersister};
use crate::state::EventLogState;
use crate::{flush, retention, scan};

/// Outcome of a combined flush and cull pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub flushed: usize,
    pub culled: u32,
}

/// One owner's segmented event log
pub struct EventLog<E: LogEntry> {
    owner_id: OwnerId,
    state: EventLogState<E>,
    config: RetentionConfig,
    store: Arc<dyn SegmentStore>,
    clock: Arc<dyn Clock>,
    persister: Arc<dyn StatePersister<E>>,
}

impl<E: LogEntry> EventLog<E> {
    /// Create an empty log for `owner_id`
    ///
    /// Fails if `config` is invalid. Warnings are logged, not returned.
    pub fn new(
        owner_id: impl Into<OwnerId>,
        config: RetentionConfig,
        store: Arc<dyn SegmentStore>,
    ) -> Result<Self, EventLogError> {
        let owner_id = owner_id.into();
        check_config(&owner_id, &config)?;
        info!(owner = %owner_id, segment_size = config.num_entries_per_persisted_segment, "Event log opened");

        Ok(Self {
            owner_id,
            state: EventLogState::new(),
            config,
            store,
            clock: Arc::new(SystemClock),
            persister: Arc::new(NoopPersister),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_persister(mut self, persister: Arc<dyn StatePersister<E>>) -> Self {
        self.persister = persister;
        self
    }

    /// Resume from bookkeeping restored by the owner
    pub fn with_state(mut self, state: EventLogState<E>) -> Self {
        self.state = state;
        self
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn state(&self) -> &EventLogState<E> {
        &self.state
    }

    pub fn into_state(self) -> EventLogState<E> {
        self.state
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Replace the retention config; takes effect at the next append or cull
    pub fn set_config(&mut self, config: RetentionConfig) -> Result<(), EventLogError> {
        check_config(&self.owner_id, &config)?;
        self.config = config;
        Ok(())
    }

    /// Append an entry collected now; returns its sequential id
    pub fn append<F>(&mut self, unique_id: EntryUniqueId, build: F) -> u64
    where
        F: FnOnce(EntryHeader) -> E,
    {
        let collected_at = self.clock.now_utc();
        self.append_at(collected_at, unique_id, build)
    }

    /// Append an entry with an explicit collection time
    pub fn append_at<F>(&mut self, collected_at: DateTime<Utc>, unique_id: EntryUniqueId, build: F) -> u64
    where
        F: FnOnce(EntryHeader) -> E,
    {
        self.state.append(&self.config, collected_at, unique_id, build)
    }

    pub fn can_flush(&self) -> bool {
        self.state.can_flush()
    }

    /// Persist all pending segments
    pub async fn flush(&mut self) -> Result<usize, EventLogError> {
        let now = self.clock.now_utc();
        flush::flush(&mut self.state, self.store.as_ref(), &self.owner_id, now).await
    }

    /// Run one bounded retention pass
    pub async fn cull(&mut self) -> Result<u32, EventLogError> {
        let now = self.clock.now_utc();
        retention::cull(
            &mut self.state,
            self.store.as_ref(),
            &self.owner_id,
            &self.config,
            now,
            self.persister.as_ref(),
        )
        .await
    }

    /// Flush, then cull, as an owner does on its periodic tick
    #[instrument(skip_all, fields(owner = %self.owner_id))]
    pub async fn flush_and_cull(&mut self) -> Result<MaintenanceReport, EventLogError> {
        let flushed = self.flush().await?;
        let culled = self.cull().await?;
        Ok(MaintenanceReport { flushed, culled })
    }

    /// Forget and delete every persisted segment, as when the owner is deleted
    pub async fn remove_all(&mut self) -> Result<usize, EventLogError> {
        retention::remove_all(
            &mut self.state,
            self.store.as_ref(),
            &self.owner_id,
            self.persister.as_ref(),
        )
        .await
    }

    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanResponse<E>, EventLogError> {
        scan::scan(&self.state, self.store.as_ref(), &self.owner_id, request).await
    }
}

impl<E: LogEntry> std::fmt::Debug for EventLog<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("owner_id", &self.owner_id)
            .field("running_entry_id", &self.state.running_entry_id())
            .field("running_segment_id", &self.state.running_segment_id())
            .field("oldest_available_segment_id", &self.state.oldest_available_segment_id())
            .field("pending", &self.state.pending_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn check_config(owner_id: &OwnerId, config: &RetentionConfig) -> Result<(), EventLogError> {
    config.validate()?;
    for warning in config.warnings() {
        warn!(owner = %owner_id, %warning, "Retention config warning");
    }
    Ok(())
}
