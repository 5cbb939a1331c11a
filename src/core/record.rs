//! Log record structure

use super::field::Field;
use super::log_level::LogLevel;
use chrono::{DateTime, Local};
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

/// Call site of a logging call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub file: &'static str,
    pub line: u32,
}

impl Caller {
    pub fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }

    /// `dir/file.rs:line`, keeping only the last directory of the path
    pub fn short(&self) -> String {
        let file = self.file.replace('\\', "/");
        let trimmed = match file.rmatch_indices('/').nth(1) {
            Some((idx, _)) => &file[idx + 1..],
            None => file.as_str(),
        };
        format!("{}:{}", trimmed, self.line)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One log event, created once per logging call and never mutated afterwards
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    pub logger_name: Option<String>,
    pub fields: Vec<Field>,
    pub caller: Option<Caller>,
    pub stacktrace: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
            logger_name: None,
            fields: Vec::new(),
            caller: None,
            stacktrace: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_logger_name(mut self, name: Option<String>) -> Self {
        self.logger_name = name;
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_stacktrace(mut self, stacktrace: String) -> Self {
        self.stacktrace = Some(stacktrace);
        self
    }
}

/// Capture the current stack, dropping `skip` frames after the capture machinery
pub(crate) fn capture_stacktrace(skip: usize) -> String {
    let rendered = Backtrace::force_capture().to_string();
    let frames = split_frames(&rendered);

    // The first frames belong to std's capture and this function
    let first_own = frames
        .iter()
        .position(|frame| !is_capture_frame(frame))
        .unwrap_or(0);
    frames
        .into_iter()
        .skip(first_own + skip)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_capture_frame(frame: &str) -> bool {
    frame.contains("std::backtrace") || frame.contains("capture_stacktrace")
}

/// Group rendered backtrace lines into frames (`N: symbol` plus its `at` line)
fn split_frames(rendered: &str) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim_start();
        let starts_frame = trimmed
            .split_once(':')
            .map(|(idx, _)| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        match frames.last_mut() {
            Some(frame) if !starts_frame => {
                frame.push('\n');
                frame.push_str(line);
            }
            _ => frames.push(line.to_string()),
        }
    }
    frames
}
