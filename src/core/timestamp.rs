//! Timestamp formatting for encoded records

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Timestamp rendering options
///
/// # Examples
///
/// ```
/// use sparrow_log::core::TimestampFormat;
/// use chrono::Local;
///
/// let rendered = TimestampFormat::Iso8601.format(&Local::now());
/// assert_eq!(rendered.len(), "2025-01-08T10:30:45.123+0800".len());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds and numeric offset: `2025-01-08T10:30:45.123+0800`
    #[default]
    Iso8601,

    /// RFC 3339 format: `2025-01-08T10:30:45.123+08:00`
    Rfc3339,

    /// Fractional Unix seconds: `1736332245.123`
    Epoch,

    /// Unix timestamp in milliseconds: `1736332245123`
    EpochMillis,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format<Tz: TimeZone>(&self, datetime: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string(),
            TimestampFormat::Rfc3339 => datetime
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
            TimestampFormat::Epoch => {
                format!("{:.3}", datetime.timestamp_millis() as f64 / 1000.0)
            }
            TimestampFormat::EpochMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => {
                let mut out = String::new();
                if write!(out, "{}", datetime.format(format_str)).is_err() {
                    // Unrenderable pattern; fall back rather than lose the record
                    return TimestampFormat::Iso8601.format(datetime);
                }
                out
            }
        }
    }

    /// Check that a custom pattern only uses known strftime specifiers
    ///
    /// # Errors
    ///
    /// Returns the offending pattern when chrono cannot parse it.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            TimestampFormat::Custom(format_str) => {
                if StrftimeItems::new(format_str).any(|item| matches!(item, Item::Error)) {
                    Err(format!("invalid timestamp pattern '{}'", format_str))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Check if this is a numeric format, emitted unquoted in JSON
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TimestampFormat::Epoch | TimestampFormat::EpochMillis)
    }

    /// Name of a fresh log file, `YYYYMMDDhhmmss.log`, from the given time
    pub fn file_stamp(now: &DateTime<Local>) -> String {
        now.format("%Y%m%d%H%M%S.log").to_string()
    }
}
