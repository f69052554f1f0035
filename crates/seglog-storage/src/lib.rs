//! # Seglog Storage
//!
//! [`SegmentStore`](seglog_core::SegmentStore) backends.
//!
//! ## Backends
//!
//! - [`InMemorySegmentStore`]: `DashMap` of per-owner ordered maps, for tests
//!   and ephemeral owners
//! - [`RedbSegmentStore`]: durable single-file store on redb, with a metadata
//!   table so timestamp lookups never read payload bytes
//!
//! Both backends behave identically behind `Arc<dyn SegmentStore>`.

pub mod memory;
pub mod redb_store;

pub use memory::InMemorySegmentStore;
pub use redb_store::{RedbSegmentStore, RedbStoreConfig};
