//! Error types for seglog-engine

use seglog_core::{CodecError, ConfigError, InvalidScanRequest, SegmentKey, StorageError};
use thiserror::Error;

/// Errors that can occur while driving an event log
///
/// Desync is not an error: it is reported through
/// [`ScanResponse::Desync`](seglog_core::ScanResponse::Desync).
#[derive(Debug, Error)]
pub enum EventLogError {
    /// Segment store call failed, not retried
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Stored payload could not be encoded or decoded
    #[error("segment codec error: {0}")]
    Codec(#[from] CodecError),

    /// Bookkeeping says a segment is persisted but the store does not have it
    #[error("persisted segment {0} is missing")]
    MissingSegment(SegmentKey),

    #[error("invalid scan request: {0}")]
    InvalidRequest(#[from] InvalidScanRequest),

    #[error("invalid retention config: {0}")]
    Config(#[from] ConfigError),

    /// The owner's bookkeeping could not be made durable
    #[error("failed to persist event log state: {0}")]
    Persist(String),
}

impl EventLogError {
    /// Create a new Persist error
    pub fn persist(message: impl Into<String>) -> Self {
        Self::Persist(message.into())
    }

    /// Whether the error signals lost data rather than a transient failure
    pub fn is_data_loss(&self) -> bool {
        matches!(self, EventLogError::MissingSegment(_))
    }
}
