//! Logger configuration
//!
//! [`Config`] is a plain value; any configuration loader that speaks serde can
//! produce one. Missing keys take the defaults below.

use super::encoder::EncoderConfig;
use super::error::{LoggerError, Result};
use super::field::Field;
use super::log_level::LogLevel;
use super::timestamp::TimestampFormat;
use crate::sinks::buffered::{BufferOptions, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL};
use crate::sinks::rotating_file::RotationPolicy;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const MEGABYTE: u64 = 1024 * 1024;
const DAY: Duration = Duration::from_secs(24 * 3600);

/// Everything needed to build a [`Logger`](super::Logger)
///
/// # Examples
///
/// ```
/// use sparrow_log::Config;
/// use std::time::Duration;
///
/// let config: Config = serde_json::from_str(
///     r#"{ "enable_file": true, "dir": "/var/log/app", "level": "debug", "interval": "1h" }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.filename(), "/var/log/app/default.log");
/// assert_eq!(config.interval, Duration::from_secs(3600));
/// assert_eq!(config.max_backup, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enable_console: bool,
    pub console_json_format: bool,
    /// Threshold of the console sink
    ///
    /// Records must also pass `level`, so a `console_level` below `level`
    /// has no effect until the logger level is lowered.
    pub console_level: String,
    pub enable_file: bool,
    pub file_json_format: bool,
    pub dir: String,
    /// File name inside `dir`; empty picks a `YYYYMMDDhhmmss.log` name
    pub name: String,
    /// Logger-wide threshold, shared by the file sink
    pub level: String,
    /// Fields bound to every record of the root logger
    pub fields: Vec<Field>,
    pub add_caller: bool,
    /// Name of the root logger
    pub prefix: String,
    /// Rotate the file past this many megabytes (0 disables)
    pub max_size: u64,
    /// Rotate the file and prune archives past this many days (0 disables)
    pub max_age: u64,
    /// Archives to keep (0 keeps all)
    pub max_backup: usize,
    /// Fixed rotation period (zero disables)
    #[serde(with = "duration_text")]
    pub interval: Duration,
    /// Leading frames dropped from captured stack traces
    pub caller_skip: usize,
    /// Buffer sinks and write from a background thread
    #[serde(rename = "async")]
    pub async_write: bool,
    /// Colored levels, padded messages, non-terminating `fatal`/`panic`
    pub debug: bool,
    pub buffer_size: usize,
    #[serde(with = "duration_text")]
    pub flush_interval: Duration,
    /// Gzip rotated archives
    pub compress: bool,
    pub encoder: EncoderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_console: true,
            console_json_format: false,
            console_level: "info".to_string(),
            enable_file: false,
            file_json_format: true,
            dir: ".".to_string(),
            name: "default.log".to_string(),
            level: "info".to_string(),
            fields: Vec::new(),
            add_caller: true,
            prefix: String::new(),
            max_size: 500,
            max_age: 1,
            max_backup: 10,
            interval: DAY,
            caller_skip: 1,
            async_write: true,
            debug: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            compress: false,
            encoder: EncoderConfig::default(),
        }
    }
}

impl Config {
    /// `dir/name`, exactly as configured
    pub fn filename(&self) -> String {
        format!("{}/{}", self.dir, self.name)
    }

    /// Path the file sink opens, naming the file after `now` when `name` is empty
    pub fn file_path(&self, now: &DateTime<Local>) -> PathBuf {
        let dir = if self.dir.is_empty() { "." } else { &self.dir };
        let name = if self.name.is_empty() {
            TimestampFormat::file_stamp(now)
        } else {
            self.name.clone()
        };
        PathBuf::from(dir).join(name)
    }

    /// Logger-wide threshold; an empty string means `info`
    ///
    /// # Errors
    ///
    /// Returns `InvalidLevel` for unknown level text
    pub fn level(&self) -> Result<LogLevel> {
        parse_level(&self.level)
    }

    /// # Errors
    ///
    /// Returns `InvalidLevel` for unknown level text
    pub fn console_level(&self) -> Result<LogLevel> {
        parse_level(&self.console_level)
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            max_bytes: self.max_size.saturating_mul(MEGABYTE),
            max_age: (self.max_age > 0).then(|| DAY * self.max_age as u32),
            interval: (!self.interval.is_zero()).then_some(self.interval),
            max_backups: self.max_backup,
            compress: self.compress,
        }
    }

    pub fn buffer_options(&self) -> BufferOptions {
        BufferOptions {
            buffer_size: self.buffer_size,
            flush_interval: self.flush_interval,
        }
    }

    /// Check everything `build` would otherwise trip over
    ///
    /// # Errors
    ///
    /// Returns the first invalid level, encoder or buffer setting found
    pub fn validate(&self) -> Result<()> {
        self.level()?;
        self.console_level()?;
        self.encoder.validate()?;

        if self.async_write {
            if self.buffer_size == 0 {
                return Err(LoggerError::config("buffer", "buffer_size must be positive"));
            }
            if self.flush_interval.is_zero() {
                return Err(LoggerError::config(
                    "buffer",
                    "flush_interval must be positive",
                ));
            }
        }
        if self.enable_file && self.max_age > u64::from(u32::MAX) {
            return Err(LoggerError::config("file", "max_age is out of range"));
        }
        Ok(())
    }

    /// Build the logger and the guard that shuts its sinks down
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or when the log file cannot be opened
    pub fn build(self) -> Result<(super::Logger, super::ShutdownGuard)> {
        super::LoggerBuilder::new(self).build()
    }
}

fn parse_level(text: &str) -> Result<LogLevel> {
    if text.trim().is_empty() {
        Ok(LogLevel::Info)
    } else {
        text.parse()
    }
}

/// Durations as human-readable text (`"24h"`, `"100ms"`) or integer milliseconds
mod duration_text {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration such as \"100ms\" or \"24h\", or milliseconds")
            }

            fn visit_str<E: de::Error>(self, text: &str) -> Result<Duration, E> {
                humantime::parse_duration(text.trim()).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, millis: u64) -> Result<Duration, E> {
                Ok(Duration::from_millis(millis))
            }

            fn visit_i64<E: de::Error>(self, millis: i64) -> Result<Duration, E> {
                u64::try_from(millis)
                    .map(Duration::from_millis)
                    .map_err(|_| E::custom("duration must not be negative"))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}
