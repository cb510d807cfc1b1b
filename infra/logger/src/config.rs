use serde::Deserialize;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;

pub(crate) const DEFAULT_MAX_FILES: usize = 10;
const DEFAULT_NAME: &str = "tether";

/// Minimum severity emitted when no filter directive says otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Self::OFF,
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

/// Line layout of emitted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Self::MINUTELY,
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
            LogRotation::Never => Self::NEVER,
        }
    }
}

/// Settings for [`Logger::init`](crate::Logger::init).
///
/// Deserializable so it can sit in an application's config file under a
/// `[logger]` table. File output is enabled by setting `directory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Identifies the application; used as the log file prefix.
    pub name: String,
    pub level: LogLevel,
    /// Extra filter directives such as `tether_dispatch=trace,hyper=warn`.
    pub filter: Option<String>,
    pub format: LogFormat,
    pub console: bool,
    pub directory: Option<PathBuf>,
    pub rotation: LogRotation,
    pub max_files: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            level: LogLevel::default(),
            filter: None,
            format: LogFormat::default(),
            console: true,
            directory: None,
            rotation: LogRotation::default(),
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl LoggerConfig {
    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub const fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Enables rolling file output into `directory`.
    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub const fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use = "The config must be passed to Logger::init to take effect."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.max_files = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full() {
        let config: LoggerConfig = serde_json::from_str(
            r#"{
                "name": "demo",
                "level": "debug",
                "filter": "tether_dispatch=trace",
                "format": "json",
                "console": false,
                "directory": "/var/log/demo",
                "rotation": "hourly",
                "max_files": 3
            }"#,
        )
        .unwrap();

        assert_eq!(config.name, "demo");
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter.as_deref(), Some("tether_dispatch=trace"));
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.console);
        assert_eq!(config.directory, Some(PathBuf::from("/var/log/demo")));
        assert_eq!(config.rotation, LogRotation::Hourly);
        assert_eq!(config.max_files, 3);
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: LoggerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoggerConfig::default());
        assert!(config.console);
        assert_eq!(config.max_files, DEFAULT_MAX_FILES);
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(serde_json::from_str::<LoggerConfig>(r#"{ "format": "xml" }"#).is_err());
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(LevelFilter::from(LogLevel::Off), LevelFilter::OFF);
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
    }
}
