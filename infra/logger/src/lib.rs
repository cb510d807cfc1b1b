//! # Logger
//!
//! Installs the process-wide `tracing` subscriber for tether applications.
//! Console output can be compact, pretty or JSON; file output goes through a
//! non-blocking rolling appender. Filtering starts from
//! [`LoggerConfig::level`], adds the directives in [`LoggerConfig::filter`],
//! and otherwise honours `RUST_LOG`.
//!
//! ## Example
//!
//! ```rust
//! # use tether_logger::{LogLevel, Logger, LoggerConfig};
//!
//! let config = LoggerConfig::new("my-app").level(LogLevel::Debug);
//! let _logger = Logger::init(&config).unwrap();
//! ```

mod config;
mod error;

pub use crate::config::{LogFormat, LogLevel, LogRotation, LoggerConfig};
pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;

use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_SUFFIX: &str = "log";

/// A handle to the initialized logging system.
///
/// Holds the background worker guard of the file appender. Drop it only when
/// the application is shutting down.
#[must_use = "Dropping this handle will stop background logging threads."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Installs the global tracing subscriber described by `config`.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, zero
    ///   `max_files`, an unparsable filter, or no enabled output.
    /// * [`LoggerError::Internal`] if the log directory cannot be created.
    /// * [`LoggerError::Appender`] if the rolling appender cannot be built.
    /// * [`LoggerError::Subscriber`] if a global subscriber is already set.
    pub fn init(config: &LoggerConfig) -> Result<Self, LoggerError> {
        validate_config(config)?;

        let env_filter = build_env_filter(config)?;

        let mut layers = Vec::new();

        if config.console {
            let console = match config.format {
                LogFormat::Compact => layer().compact().with_ansi(true).boxed(),
                LogFormat::Pretty => layer().pretty().with_ansi(true).boxed(),
                LogFormat::Json => layer().json().boxed(),
            };
            layers.push(console);
        }

        let guard = if let Some(directory) = &config.directory {
            fs::create_dir_all(directory).map_err(|e| LoggerError::Internal {
                message: e.to_string().into(),
                context: Some(format!("Failed to create path: {}", directory.display()).into()),
            })?;

            let file_appender = RollingFileAppender::builder()
                .rotation(config.rotation.into())
                .filename_prefix(&config.name)
                .filename_suffix(LOG_FILE_SUFFIX)
                .max_log_files(config.max_files)
                .build(directory)
                .context("building file appender")?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = layer().with_writer(non_blocking).with_ansi(false);

            let boxed = if config.format == LogFormat::Json {
                file_layer.json().boxed()
            } else {
                file_layer.boxed()
            };

            layers.push(boxed);
            Some(guard)
        } else {
            None
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "No logging layers enabled. Enable console or file output.".into(),
                context: None,
            });
        }

        tracing_subscriber::registry().with(env_filter).with(layers).try_init()?;

        tracing::debug!(name = %config.name, format = ?config.format, "Logger initialized");
        Ok(Self { guard })
    }

    /// Returns the file writer's worker guard, if file output is enabled.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

fn validate_config(config: &LoggerConfig) -> Result<(), LoggerError> {
    if config.name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration {
            message: "Logger name cannot be empty".into(),
            context: None,
        });
    }

    if config.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: None,
        });
    }

    Ok(())
}

fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::from(config.level).into());
    config.filter.as_ref().map_or_else(
        || Ok(builder.from_env_lossy()),
        |filter| {
            builder.parse(filter).map_err(|e| LoggerError::InvalidConfiguration {
                message: format!("Invalid env filter '{filter}': {e}").into(),
                context: None,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_empty_name_rejected() {
        let err = validate_config(&LoggerConfig::new("  ")).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_zero_max_files_rejected() {
        let err = validate_config(&LoggerConfig::new("test-app").max_files(0)).unwrap_err();
        assert_eq!(err.kind(), "InvalidConfiguration");
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggerConfig::new("test-app").filter("tether=notalevel");
        let err = build_env_filter(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid env filter"));
    }

    #[test]
    fn test_valid_filter_accepted() {
        let config = LoggerConfig::new("test-app").filter("tether_dispatch=trace,info");
        assert!(build_env_filter(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_no_output_rejected_before_install() {
        let err = Logger::init(&LoggerConfig::new("test-app").console(false)).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    #[serial]
    fn test_file_logging_setup() -> Result<(), LoggerError> {
        let tmp_dir = tempdir().map_err(|e| LoggerError::Internal {
            message: e.to_string().into(),
            context: Some("Failed to create temp dir".into()),
        })?;
        let log_dir = tmp_dir.path().join("logs");

        let config = LoggerConfig::new("test-app").console(false).directory(&log_dir);
        let logger = Logger::init(&config)?;
        assert!(logger.guard().is_some());

        tracing::info!("hello world");
        // Dropping the handle drains the non-blocking worker.
        drop(logger);

        let entries = fs::read_dir(&log_dir).map_err(|e| LoggerError::Internal {
            message: e.to_string().into(),
            context: Some(format!("Failed to read log directory {}", log_dir.display()).into()),
        })?;

        let log_file = entries
            .flatten()
            .map(|entry| entry.path())
            .find(|path| path.extension().and_then(|e| e.to_str()) == Some("log"));

        let Some(log_file) = log_file else {
            panic!("at least one log file should be created");
        };
        let contents = fs::read_to_string(&log_file).map_err(|e| LoggerError::Internal {
            message: e.to_string().into(),
            context: Some(format!("Failed to read {}", log_file.display()).into()),
        })?;
        assert!(contents.contains("hello world"), "buffered line flushed on drop");
        Ok(())
    }
}
