//! Structured logging for Curate
//!
//! Thin setup layer over `tracing-subscriber`: console output (pretty or
//! JSONL), optional rolling JSONL files via `tracing-appender`, and an
//! `EnvFilter` seeded from [`LogConfig`] that `RUST_LOG` overrides.
//!
//! # Quick Start
//!
//! ```ignore
//! use curate_logging::{CurateSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! CurateSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! CurateSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! Keep the returned [`WorkerGuard`] alive for as long as file output
//! should be flushed.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, FilterConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to prepare log file output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build rolling appender: {0}")]
    Appender(String),

    #[error("invalid filter directive: {0}")]
    Filter(String),

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Builder for configuring and initializing the Curate logging subscriber
///
/// Console output defaults to JSONL. Use `LogConfig::development()` for
/// human-readable output.
pub struct CurateSubscriberBuilder {
    config: LogConfig,
}

impl CurateSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
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

    /// Initialize the subscriber globally.
    ///
    /// Failures are reported on stderr and leave logging disabled; use
    /// [`try_init`](Self::try_init) to handle them.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = self.env_filter()?;
        let (layers, guard) = self.build_layers()?;

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }

    /// `RUST_LOG` wins over the configured directives
    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.config.filter_directives())
                .map_err(|e| LoggingError::Filter(e.to_string())),
        }
    }

    fn build_layers(&self) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>), LoggingError> {
        let jsonl = &self.config.jsonl;
        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            if self.config.console.pretty {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(self.config.console.ansi)
                        .with_target(true)
                        .boxed(),
                );
            } else {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(jsonl.include_spans)
                        .with_span_list(jsonl.include_spans)
                        .flatten_event(jsonl.flatten_events)
                        .with_file(jsonl.include_location)
                        .with_line_number(jsonl.include_location)
                        .boxed(),
                );
            }
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_current_span(jsonl.include_spans)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(writer)
                    .boxed(),
            );
        }

        Ok((layers, guard))
    }
}

impl Default for CurateSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking writer for file output. `Never` truncates a single file;
/// the rolling strategies append and prune old files.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.jsonl", config.prefix));
            let file = File::create(path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("jsonl");
    if let Some(max) = config.max_files {
        builder = builder.max_log_files(max);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for tests; repeated calls are harmless
pub fn init_testing() {
    let _ = CurateSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = CurateSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = CurateSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config().default_level, "debug");
        assert!(builder.config().console.pretty);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = CurateSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false);
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
    }

    #[test]
    fn test_layers_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let builder = CurateSubscriberBuilder::new().with_file_output(FileConfig {
            directory: dir.path().to_path_buf(),
            prefix: "unit".to_string(),
            rotation: RotationStrategy::Never,
            max_files: None,
        });

        let (layers, guard) = builder.build_layers().unwrap();
        assert_eq!(layers.len(), 2);
        assert!(guard.is_some());
        assert!(dir.path().join("unit.jsonl").exists());

        let (layers, guard) = CurateSubscriberBuilder::new()
            .with_console(false)
            .build_layers()
            .unwrap();
        assert!(layers.is_empty());
        assert!(guard.is_none());
    }

    #[test]
    fn test_bad_directive_is_an_error() {
        let builder = CurateSubscriberBuilder::new().with_level("not a level!!");
        // RUST_LOG may be set in the environment running the tests
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(builder.env_filter(), Err(LoggingError::Filter(_))));
        }
    }
}
