//! Record encoders
//!
//! Turns a [`LogRecord`] into the bytes written to a sink:
//! - `Console`: tab-separated, human-readable, optionally colorized
//! - `Json`: one JSON object per line for machine processing

use super::error::{LoggerError, Result};
use super::field::{fields_to_json, push_json_pair};
use super::log_level::LogLevel;
use super::record::LogRecord;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Width the message is padded to when debug mode is active
pub const DEBUG_MESSAGE_WIDTH: usize = 32;

/// Output format for encoded records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Example: `2025-01-08T10:30:45.123+0800	info	api/server.rs:42	ready	{"port":8080}`
    #[default]
    Console,

    /// Example: `{"lv":"info","ts":"2025-01-08T10:30:45.123+0800","msg":"ready","port":8080}`
    Json,
}

/// How the level name is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelStyle {
    #[default]
    Lowercase,
    Capital,
    /// Capitalised and wrapped in the level's ANSI color
    CapitalColor,
}

impl LevelStyle {
    pub fn render(&self, level: LogLevel) -> String {
        match self {
            LevelStyle::Lowercase => level.as_str().to_string(),
            LevelStyle::Capital => level.capital_str().to_string(),
            LevelStyle::CapitalColor => paint(level.color_code(), level.capital_str()),
        }
    }
}

/// Wrap `text` in the ANSI escape for `color`
///
/// Written directly rather than through `Colorize` so the output does not
/// depend on whether stdout is a terminal.
pub fn paint(color: colored::Color, text: &str) -> String {
    format!("\x1b[{}m{}\x1b[0m", color.to_fg_str(), text)
}

/// Key names and rendering options shared by both output formats
///
/// An empty key omits that element from the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub message_key: String,
    pub stacktrace_key: String,
    pub line_ending: String,
    pub level_style: LevelStyle,
    pub timestamp_format: TimestampFormat,
    /// Pad messages to this many columns (debug mode)
    pub message_width: Option<usize>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            time_key: "ts".to_string(),
            level_key: "lv".to_string(),
            name_key: "logger".to_string(),
            caller_key: "caller".to_string(),
            message_key: "msg".to_string(),
            stacktrace_key: "stack".to_string(),
            line_ending: "\n".to_string(),
            level_style: LevelStyle::Lowercase,
            timestamp_format: TimestampFormat::Iso8601,
            message_width: None,
        }
    }
}

impl EncoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_level_style(mut self, style: LevelStyle) -> Self {
        self.level_style = style;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use]
    pub fn with_message_width(mut self, width: Option<usize>) -> Self {
        self.message_width = width;
        self
    }

    /// Reject configurations that cannot produce parseable records
    ///
    /// # Errors
    ///
    /// Fails when the message or level key is empty, when two keys collide,
    /// when the line ending is empty, or when a custom timestamp pattern
    /// cannot be rendered.
    pub fn validate(&self) -> Result<()> {
        if self.message_key.is_empty() {
            return Err(LoggerError::config("encoder", "message key must not be empty"));
        }
        if self.level_key.is_empty() {
            return Err(LoggerError::config("encoder", "level key must not be empty"));
        }
        if self.line_ending.is_empty() {
            return Err(LoggerError::config("encoder", "line ending must not be empty"));
        }
        self.timestamp_format
            .validate()
            .map_err(|msg| LoggerError::config("encoder", msg))?;

        let mut seen = HashSet::new();
        for key in self.keys().into_iter().filter(|k| !k.is_empty()) {
            if !seen.insert(key) {
                return Err(LoggerError::config(
                    "encoder",
                    format!("key '{}' is used more than once", key),
                ));
            }
        }
        Ok(())
    }

    fn keys(&self) -> [&str; 6] {
        [
            &self.time_key,
            &self.level_key,
            &self.name_key,
            &self.caller_key,
            &self.message_key,
            &self.stacktrace_key,
        ]
    }

    fn message<'a>(&self, record: &'a LogRecord) -> std::borrow::Cow<'a, str> {
        match self.message_width {
            Some(width) => format!("{:<width$}", record.message, width = width).into(),
            None => record.message.as_str().into(),
        }
    }
}

/// Encoder bound to one output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoder {
    format: OutputFormat,
    config: EncoderConfig,
}

impl Encoder {
    pub fn new(format: OutputFormat, config: EncoderConfig) -> Self {
        Self { format, config }
    }

    pub fn console(config: EncoderConfig) -> Self {
        Self::new(OutputFormat::Console, config)
    }

    /// Structured encoder; the level is always rendered lowercase and uncolored
    pub fn json(config: EncoderConfig) -> Self {
        Self::new(
            OutputFormat::Json,
            config.with_level_style(LevelStyle::Lowercase),
        )
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn encode(&self, record: &LogRecord) -> Vec<u8> {
        let text = match self.format {
            OutputFormat::Console => self.encode_console(record),
            OutputFormat::Json => self.encode_json(record),
        };
        text.into_bytes()
    }

    fn encode_console(&self, record: &LogRecord) -> String {
        let cfg = &self.config;
        let mut parts: Vec<String> = Vec::with_capacity(6);

        if !cfg.time_key.is_empty() {
            parts.push(cfg.timestamp_format.format(&record.timestamp));
        }
        parts.push(cfg.level_style.render(record.level));
        if !cfg.name_key.is_empty() {
            if let Some(ref name) = record.logger_name {
                parts.push(name.clone());
            }
        }
        if !cfg.caller_key.is_empty() {
            if let Some(caller) = record.caller {
                parts.push(caller.short());
            }
        }
        parts.push(sanitize_message(&cfg.message(record)));
        if !record.fields.is_empty() {
            parts.push(fields_to_json(&record.fields));
        }

        let mut line = parts.join("\t");
        if !cfg.stacktrace_key.is_empty() {
            if let Some(ref stack) = record.stacktrace {
                line.push_str(&cfg.line_ending);
                line.push_str(stack);
            }
        }
        line.push_str(&cfg.line_ending);
        line
    }

    fn encode_json(&self, record: &LogRecord) -> String {
        let cfg = &self.config;
        let mut out = String::with_capacity(128);
        out.push('{');
        let mut first = true;
        let mut pair = |out: &mut String, key: &str, value: serde_json::Value| {
            if key.is_empty() {
                return;
            }
            if !first {
                out.push(',');
            }
            first = false;
            push_json_pair(out, key, &value);
        };

        pair(
            &mut out,
            &cfg.level_key,
            serde_json::Value::String(cfg.level_style.render(record.level)),
        );
        let ts = cfg.timestamp_format.format(&record.timestamp);
        let ts_value = if cfg.timestamp_format.is_numeric() {
            serde_json::from_str(&ts).unwrap_or(serde_json::Value::String(ts))
        } else {
            serde_json::Value::String(ts)
        };
        pair(&mut out, &cfg.time_key, ts_value);
        if let Some(ref name) = record.logger_name {
            pair(&mut out, &cfg.name_key, serde_json::Value::String(name.clone()));
        }
        if let Some(caller) = record.caller {
            pair(&mut out, &cfg.caller_key, serde_json::Value::String(caller.short()));
        }
        pair(
            &mut out,
            &cfg.message_key,
            serde_json::Value::String(cfg.message(record).into_owned()),
        );
        for field in &record.fields {
            pair(&mut out, &field.key, field.value.to_json_value());
        }
        if let Some(ref stack) = record.stacktrace {
            pair(&mut out, &cfg.stacktrace_key, serde_json::Value::String(stack.clone()));
        }

        out.push('}');
        out.push_str(&cfg.line_ending);
        out
    }
}

/// Escape line breaks and tabs so one record stays one line
fn sanitize_message(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::Field;
    use crate::core::record::Caller;
    use std::time::Duration;

    fn record() -> LogRecord {
        LogRecord::new(LogLevel::Info, "ready")
            .with_fields(vec![Field::int("port", 8080), Field::string("mode", "prod")])
            .with_caller(Caller::new("/src/app/server.rs", 42))
    }

    #[test]
    fn test_json_format() {
        let encoder = Encoder::json(EncoderConfig::default());
        let bytes = encoder.encode(&record());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with('\n'));

        let parsed: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(parsed["lv"], "info");
        assert_eq!(parsed["msg"], "ready");
        assert_eq!(parsed["caller"], "app/server.rs:42");
        assert_eq!(parsed["port"], 8080);
        assert_eq!(parsed["mode"], "prod");
        assert!(parsed["ts"].is_string());
        assert!(parsed.get("logger").is_none());
    }

    #[test]
    fn test_json_key_order() {
        let encoder = Encoder::json(EncoderConfig::default());
        let text = String::from_utf8(encoder.encode(&record())).unwrap();
        let lv = text.find("\"lv\"").unwrap();
        let ts = text.find("\"ts\"").unwrap();
        let caller = text.find("\"caller\"").unwrap();
        let msg = text.find("\"msg\"").unwrap();
        let port = text.find("\"port\"").unwrap();
        let mode = text.find("\"mode\"").unwrap();
        assert!(lv < ts && ts < caller && caller < msg && msg < port && port < mode);
    }

    #[test]
    fn test_json_never_colors() {
        let config = EncoderConfig::default().with_level_style(LevelStyle::CapitalColor);
        let encoder = Encoder::json(config);
        let text = String::from_utf8(encoder.encode(&record())).unwrap();
        assert!(!text.contains('\x1b'));
        assert!(text.contains("\"lv\":\"info\""));
    }

    #[test]
    fn test_json_duration_and_stack() {
        let rec = LogRecord::new(LogLevel::Error, "slow")
            .with_fields(vec![Field::duration("took", Duration::from_millis(250))])
            .with_stacktrace("0: main".to_string());
        let encoder = Encoder::json(EncoderConfig::default());
        let text = String::from_utf8(encoder.encode(&rec)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(parsed["took"], 0.25);
        assert_eq!(parsed["stack"], "0: main");
    }

    #[test]
    fn test_json_numeric_timestamp() {
        let config =
            EncoderConfig::default().with_timestamp_format(TimestampFormat::EpochMillis);
        let encoder = Encoder::json(config);
        let text = String::from_utf8(encoder.encode(&record())).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert!(parsed["ts"].is_number());
    }

    #[test]
    fn test_console_format() {
        let encoder = Encoder::console(EncoderConfig::default());
        let text = String::from_utf8(encoder.encode(&record())).unwrap();
        let columns: Vec<&str> = text.trim_end().split('\t').collect();
        assert_eq!(columns.len(), 5);
        assert_eq!(columns[1], "info");
        assert_eq!(columns[2], "app/server.rs:42");
        assert_eq!(columns[3], "ready");
        assert_eq!(columns[4], r#"{"port":8080,"mode":"prod"}"#);
    }

    #[test]
    fn test_console_colorized_levels() {
        let config = EncoderConfig::default().with_level_style(LevelStyle::CapitalColor);
        let encoder = Encoder::console(config);
        let cases = [
            (LogLevel::Debug, "\x1b[34mDEBUG\x1b[0m"),
            (LogLevel::Info, "\x1b[32mINFO\x1b[0m"),
            (LogLevel::Warn, "\x1b[33mWARN\x1b[0m"),
            (LogLevel::Error, "\x1b[31mERROR\x1b[0m"),
            (LogLevel::Fatal, "\x1b[31mFATAL\x1b[0m"),
        ];
        for (level, expected) in cases {
            let text = String::from_utf8(encoder.encode(&LogRecord::new(level, "m"))).unwrap();
            assert!(text.contains(expected), "{:?} rendered as {:?}", level, text);
        }
    }

    #[test]
    fn test_debug_message_padding() {
        let config = EncoderConfig::default().with_message_width(Some(DEBUG_MESSAGE_WIDTH));
        let encoder = Encoder::console(config);
        let rec = LogRecord::new(LogLevel::Info, "short").with_fields(vec![Field::bool("a", true)]);
        let text = String::from_utf8(encoder.encode(&rec)).unwrap();
        let message = text.split('\t').nth(2).unwrap();
        assert_eq!(message.len(), DEBUG_MESSAGE_WIDTH);
        assert!(message.starts_with("short"));
    }

    #[test]
    fn test_console_escapes_newlines() {
        let encoder = Encoder::console(EncoderConfig::default());
        let rec = LogRecord::new(LogLevel::Info, "line one\nERROR fake");
        let text = String::from_utf8(encoder.encode(&rec)).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("line one\\nERROR fake"));
    }

    #[test]
    fn test_logger_name_rendered() {
        let rec = LogRecord::new(LogLevel::Warn, "m").with_logger_name(Some("api.db".into()));
        let json = String::from_utf8(Encoder::json(EncoderConfig::default()).encode(&rec)).unwrap();
        assert!(json.contains("\"logger\":\"api.db\""));
        let console =
            String::from_utf8(Encoder::console(EncoderConfig::default()).encode(&rec)).unwrap();
        assert!(console.contains("\tapi.db\t"));
    }

    #[test]
    fn test_validate() {
        assert!(EncoderConfig::default().validate().is_ok());

        let mut config = EncoderConfig::default();
        config.message_key.clear();
        assert!(config.validate().is_err());

        let mut config = EncoderConfig::default();
        config.caller_key = "ts".to_string();
        assert!(config.validate().is_err());

        let mut config = EncoderConfig::default();
        config.line_ending.clear();
        assert!(config.validate().is_err());

        let config = EncoderConfig::default()
            .with_timestamp_format(TimestampFormat::Custom("%Y %Q".to_string()));
        assert!(matches!(
            config.validate(),
            Err(LoggerError::InvalidConfiguration { ref component, .. }) if component == "encoder"
        ));

        let mut config = EncoderConfig::default();
        config.stacktrace_key.clear();
        config.name_key.clear();
        assert!(config.validate().is_ok());
    }
}
