//! # Seglog Core
//!
//! Core types, traits, and errors for a per-owner segmented event log.
//!
//! An owner appends timestamped entries to a live buffer. Full buffers are
//! sealed into immutable segments, persisted to a [`SegmentStore`], aged out
//! under a [`RetentionConfig`], and read back through cursor-based scans.
//! The engine that drives all of this lives in `seglog-engine`; this crate
//! holds the vocabulary it shares with storage backends and readers.
//!
//! ## Key Types
//!
//! - [`LogEntry`] / [`EntryHeader`]: what an entry must carry
//! - [`Cursor`] / [`DirectCursor`]: symbolic and concrete log positions
//! - [`ScanRequest`] / [`ScanResponse`]: the read protocol, including desync
//! - [`PersistedSegment`] / [`SegmentPayload`]: sealed segments and their content
//! - [`codec`]: the legacy and versioned payload envelopes
//!
//! ## Key Traits
//!
//! - [`SegmentStore`]: durable segment storage
//! - [`Clock`]: time abstraction for testability

pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod model;
pub mod scan;
pub mod segment;
pub mod traits;

pub use codec::CompressionAlgorithm;
pub use config::{ConfigWarning, RetentionConfig};
pub use cursor::{Cursor, DirectCursor};
pub use error::*;
pub use model::*;
pub use scan::*;
pub use segment::*;
pub use traits::*;
