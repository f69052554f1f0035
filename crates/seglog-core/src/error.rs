//! Error types for seglog-core
//!
//! Storage backends, the payload codec, configuration loading and cursor
//! parsing each get their own error type so callers can match on the
//! failure domain they care about.

use thiserror::Error;

/// Errors that can occur in segment store operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Backend database error
    #[error("Database error: {0}")]
    Database(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

impl StorageError {
    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}

/// Errors produced while encoding or decoding a segment payload
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload buffer had no bytes at all
    #[error("segment payload is empty")]
    Empty,

    /// A segment with no entries cannot be sealed
    #[error("cannot seal a segment without entries")]
    EmptySegment,

    /// First byte is neither the legacy tag nor the envelope sentinel
    #[error("unrecognized payload marker byte {0:#04x}")]
    UnknownMarker(u8),

    /// Envelope declares a schema version this build cannot read
    #[error("unsupported payload schema version {0}")]
    UnsupportedSchemaVersion(u32),

    /// Envelope declares an unknown compression algorithm
    #[error("unsupported compression algorithm {0}")]
    UnsupportedCompression(u32),

    /// Envelope header ended before all fields were read
    #[error("truncated payload envelope")]
    Truncated,

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("compression error: {0}")]
    Compression(String),
}

/// Configuration invariant violations and load failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("num_entries_per_persisted_segment must be greater than zero")]
    ZeroSegmentSize,

    #[error(
        "min_persisted_segments_to_retain ({min}) must not exceed max_persisted_segments_to_retain ({max})"
    )]
    MinExceedsMax { min: u32, max: u32 },

    #[error("max_persisted_segments_to_remove_at_once must be at least 2, got {0}")]
    RemoveAtOnceTooSmall(u32),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A unique id string that is not of the form `HIGH-LOW` (hex)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid unique id '{0}', expected <16 hex digits>-<16 hex digits>")]
pub struct InvalidUniqueId(pub String);

/// Errors from parsing the textual cursor form
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorParseError {
    #[error("cursor is empty")]
    Empty,

    #[error("cursor '{0}' must have 2 or 3 '_'-separated parts")]
    PartCount(String),

    #[error("invalid segment id '{0}' in cursor")]
    SegmentId(String),

    #[error("invalid entry index '{0}' in cursor")]
    EntryIndex(String),

    #[error(transparent)]
    UniqueId(#[from] InvalidUniqueId),
}

/// Misuse of the scan protocol, rejected before touching any segment
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidScanRequest {
    #[error("time range filters are only supported when scanning towards newer entries")]
    TimeFilterRequiresForward,

    #[error("requested {requested} entries, at most {max} are allowed per scan")]
    TooManyEntries { requested: usize, max: usize },
}
