//! Retention configuration
//!
//! Controls segment size and how many persisted segments survive a cull.
//! Limits may change between culls; segments already sealed keep their
//! size and numbering.
//!
//! ```toml
//! retention_secs = 1209600
//! num_entries_per_persisted_segment = 50
//! min_persisted_segments_to_retain = 20
//! max_persisted_segments_to_retain = 1000
//! max_persisted_segments_to_remove_at_once = 5
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Limits applied by flush and cull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Segments whose newest entry is younger than this are kept,
    /// unless the count exceeds `max_persisted_segments_to_retain`
    #[serde(rename = "retention_secs", with = "duration_secs")]
    pub retention: Duration,
    /// Live buffer size at which a segment is sealed
    pub num_entries_per_persisted_segment: usize,
    /// Never cull below this many persisted segments, regardless of age
    pub min_persisted_segments_to_retain: u32,
    /// Always cull above this many persisted segments, regardless of age
    pub max_persisted_segments_to_retain: u32,
    /// Budget of removals in a single cull
    pub max_persisted_segments_to_remove_at_once: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention: DAY * 14,
            num_entries_per_persisted_segment: 50,
            min_persisted_segments_to_retain: 20,
            max_persisted_segments_to_retain: 1000,
            max_persisted_segments_to_remove_at_once: 5,
        }
    }
}

impl RetentionConfig {
    /// Default limits, sized for long-lived production owners
    pub fn production() -> Self {
        Self::default()
    }

    /// Small segments and a short window, for local iteration
    pub fn development() -> Self {
        Self {
            retention: DAY,
            num_entries_per_persisted_segment: 10,
            min_persisted_segments_to_retain: 2,
            max_persisted_segments_to_retain: 50,
            max_persisted_segments_to_remove_at_once: 5,
        }
    }

    /// Tiny segments so tests cross segment boundaries quickly
    pub fn testing() -> Self {
        Self {
            retention: DAY,
            num_entries_per_persisted_segment: 3,
            min_persisted_segments_to_retain: 2,
            max_persisted_segments_to_retain: 10,
            max_persisted_segments_to_remove_at_once: 4,
        }
    }

    pub fn with_segment_size(mut self, num_entries: usize) -> Self {
        self.num_entries_per_persisted_segment = num_entries;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_segment_limits(mut self, min: u32, max: u32) -> Self {
        self.min_persisted_segments_to_retain = min;
        self.max_persisted_segments_to_retain = max;
        self
    }

    pub fn with_remove_at_once(mut self, count: u32) -> Self {
        self.max_persisted_segments_to_remove_at_once = count;
        self
    }

    /// Check the hard invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_entries_per_persisted_segment == 0 {
            return Err(ConfigError::ZeroSegmentSize);
        }
        if self.min_persisted_segments_to_retain > self.max_persisted_segments_to_retain {
            return Err(ConfigError::MinExceedsMax {
                min: self.min_persisted_segments_to_retain,
                max: self.max_persisted_segments_to_retain,
            });
        }
        if self.max_persisted_segments_to_remove_at_once < 2 {
            return Err(ConfigError::RemoveAtOnceTooSmall(
                self.max_persisted_segments_to_remove_at_once,
            ));
        }
        Ok(())
    }

    /// Legal but suspicious settings
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.retention.is_zero() {
            warnings.push(ConfigWarning::ZeroRetention);
        }

        if self.min_persisted_segments_to_retain == 0 {
            warnings.push(ConfigWarning::NoMinimumRetained);
        }

        if self.num_entries_per_persisted_segment > 10_000 {
            warnings.push(ConfigWarning::LargeSegments);
        }

        warnings
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Entries collected strictly before this instant are past retention
    pub fn retention_threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.retention)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Configuration warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Retention of zero culls every segment above the minimum on every pass
    ZeroRetention,
    /// Without a minimum, an idle owner can lose all persisted history
    NoMinimumRetained,
    /// Segment size is very large (> 10000 entries)
    LargeSegments,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::ZeroRetention => write!(f, "retention is zero"),
            ConfigWarning::NoMinimumRetained => {
                write!(f, "min_persisted_segments_to_retain is zero")
            }
            ConfigWarning::LargeSegments => {
                write!(f, "num_entries_per_persisted_segment is very large (> 10000)")
            }
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
