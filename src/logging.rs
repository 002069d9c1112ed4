//! Logging setup
//!
//! The library only emits `tracing` events. Binaries call [`init_logging`]
//! once to install a subscriber writing to stderr, so stdout stays free for
//! user-facing output.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::Error;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: LogLevel,
    /// Output format (JSON, Compact, Pretty)
    pub format: LogFormat,
    /// Whether to log span close events
    pub include_spans: bool,
    /// Whether to include file/line information
    pub include_file_line: bool,
    /// Custom environment filter, overrides `level`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            include_spans: false,
            include_file_line: false,
            custom_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Apply `ALASKAPAY_LOG_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = env::var("ALASKAPAY_LOG_LEVEL") {
            self.level = level.parse().unwrap_or(self.level);
        }

        if let Ok(format) = env::var("ALASKAPAY_LOG_FORMAT") {
            self.format = format.parse().unwrap_or(self.format);
        }

        if let Ok(spans) = env::var("ALASKAPAY_LOG_SPANS") {
            self.include_spans = spans.parse().unwrap_or(self.include_spans);
        }

        if let Ok(filter) = env::var("ALASKAPAY_LOG_FILTER") {
            self.custom_filter = Some(filter);
        }

        self
    }

    /// Create logging configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn env_filter(&self) -> Result<EnvFilter, Error> {
        match &self.custom_filter {
            Some(filter) => EnvFilter::try_new(filter)
                .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", filter, e))),
            None => Ok(EnvFilter::new(format!(
                "alaskapay_sdk={level},alaskapay={level},warn",
                level = Level::from(self.level)
            ))),
        }
    }
}

/// Supported logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Supported log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON format
    Json,
    /// Compact human-readable format
    Compact,
    /// Pretty human-readable format with indentation
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Error> {
    let env_filter = config.env_filter()?;
    let span_events = if config.include_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events)
                    .with_file(config.include_file_line)
                    .with_line_number(config.include_file_line),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events)
                    .with_file(config.include_file_line)
                    .with_line_number(config.include_file_line),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events)
                    .with_file(config.include_file_line)
                    .with_line_number(config.include_file_line),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}
