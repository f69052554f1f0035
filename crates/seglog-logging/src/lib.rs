//! Structured logging for seglog
//!
//! Wires `tracing` output for the seglog binaries and test suites. The engine
//! crates only emit events and spans; installing a subscriber is left to
//! whoever owns the process.
//!
//! # Quick Start
//!
//! ```ignore
//! use seglog_logging::{LogConfig, SeglogSubscriberBuilder};
//!
//! // JSON lines to console
//! let _guard = SeglogSubscriberBuilder::new().init()?;
//!
//! // Pretty console output while developing
//! let _guard = SeglogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! Keep the returned guard alive for as long as file output should flush.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};
use std::io;

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to create rolling log appender: {0}")]
    Appender(String),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builder for configuring and installing the seglog subscriber
///
/// By default, console output uses JSON lines. Use
/// [`LogConfig::development`] for human-readable output.
#[derive(Debug, Default)]
pub struct SeglogSubscriberBuilder {
    config: LogConfig,
}

impl SeglogSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer guard when file output is enabled. Fails if
    /// the log file cannot be opened or a subscriber is already installed.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(self.console_layer());
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = create_file_writer(file_config)?;
            layers.push(json_layer(&self.config.json, writer));
            guard = Some(file_guard);
        }

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    fn console_layer(&self) -> BoxedLayer {
        if self.config.console.pretty {
            tracing_subscriber::fmt::layer()
                .with_ansi(self.config.console.ansi)
                .with_target(true)
                .boxed()
        } else {
            json_layer(&self.config.json, io::stdout)
        }
    }
}

fn json_layer<W>(json: &JsonConfig, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(json.include_spans)
        .flatten_event(json.flatten_events)
        .with_file(json.include_location)
        .with_line_number(json.include_location)
        .with_writer(writer)
        .boxed()
}

/// Open the configured log file; `Never` truncates, others append and rotate
fn create_file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file_config.directory)?;

    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            let file = File::create(path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .filename_suffix("log");
    if let Some(max_files) = file_config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&file_config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Install JSON lines console logging with default settings
pub fn init_default() -> Result<(), LoggingError> {
    SeglogSubscriberBuilder::new().init().map(|_| ())
}

/// Install verbose, pretty console logging
pub fn init_development() -> Result<(), LoggingError> {
    SeglogSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
        .map(|_| ())
}

/// Install quiet logging for tests; repeated calls are harmless
pub fn init_testing() {
    let _ = SeglogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
