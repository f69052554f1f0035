//! # Seglog Engine
//!
//! Drives one owner's segmented event log over a
//! [`SegmentStore`](seglog_core::SegmentStore).
//!
//! ## Operations
//!
//! - **Append**: assign the next sequential id and buffer the entry; a full
//!   buffer is sealed into a pending segment. Never suspends.
//! - **Flush**: write pending segments to the store, oldest first.
//! - **Cull**: remove the oldest persisted segments under count and age
//!   limits, bounded per pass.
//! - **Scan**: read entries forward or backward from a cursor, detecting
//!   desync after a rollback.
//! - **Remove all**: forget and delete every persisted segment of the owner.
//!
//! The free functions in [`flush`], [`retention`] and [`scan`] take the state
//! and store explicitly; [`EventLog`] bundles them for the common case.
//!
//! ## Storage tiers
//!
//! ```text
//! [ persisted: store ][ pending: memory ][ live buffer ]
//!  oldest_available    persisted_end      running_segment_id
//! ```

pub mod access;
pub mod error;
pub mod flush;
pub mod log;
pub mod retention;
pub mod scan;
pub mod state;

pub use access::{SegmentView, segment_view};
pub use error::EventLogError;
pub use log::{EventLog, MaintenanceReport};
pub use retention::{NoopPersister, StatePersister};
pub use state::EventLogState;
