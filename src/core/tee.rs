//! Fan-out of one record to every sink pipeline

use super::encoder::Encoder;
use super::error::Result;
use super::level_controller::LevelController;
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::record::LogRecord;
use super::sink::WriteSyncer;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// One pipeline: a level filter, an encoder and a destination
#[derive(Clone)]
pub struct TeeEntry {
    pub encoder: Encoder,
    pub writer: Arc<dyn WriteSyncer>,
    pub level: LevelController,
}

impl TeeEntry {
    pub fn new(encoder: Encoder, writer: Arc<dyn WriteSyncer>, level: LevelController) -> Self {
        Self {
            encoder,
            writer,
            level,
        }
    }
}

/// Ordered, fixed list of pipelines built once at construction
///
/// A failure or panic inside one pipeline is reported and counted, and the
/// remaining pipelines still receive the record.
pub struct Tee {
    entries: Vec<TeeEntry>,
    metrics: Arc<LoggerMetrics>,
}

impl Tee {
    pub fn new(entries: Vec<TeeEntry>, metrics: Arc<LoggerMetrics>) -> Self {
        Self { entries, metrics }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Arc::new(LoggerMetrics::new()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TeeEntry] {
        &self.entries
    }

    pub fn metrics(&self) -> &Arc<LoggerMetrics> {
        &self.metrics
    }

    /// Whether any pipeline would admit a record at `level`
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.entries.iter().any(|entry| entry.level.enabled(level))
    }

    pub fn emit(&self, record: &LogRecord) {
        let mut delivered = false;
        let mut has_error = false;

        for entry in self
            .entries
            .iter()
            .filter(|entry| entry.level.enabled(record.level))
        {
            delivered = true;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let bytes = entry.encoder.encode(record);
                entry.writer.write(&bytes)
            }));

            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    eprintln!(
                        "[LOGGER ERROR] Sink '{}' failed: {}",
                        entry.writer.name(),
                        e
                    );
                    self.metrics.record_sink_failure();
                    has_error = true;
                }
                Err(panic_info) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Sink '{}' panicked: {}. Other sinks continue to function.",
                        entry.writer.name(),
                        panic_message(panic_info.as_ref())
                    );
                    self.metrics.record_sink_failure();
                    has_error = true;
                }
            }
        }

        if has_error {
            self.metrics.record_dropped();
        } else if delivered {
            self.metrics.record_logged();
        }
    }

    /// Sync every pipeline, returning the first error after trying all of them
    pub fn sync(&self) -> Result<()> {
        let mut first_error = None;
        for entry in &self.entries {
            if let Err(e) = entry.writer.sync() {
                eprintln!(
                    "[LOGGER ERROR] Sink '{}' flush failed: {}",
                    entry.writer.name(),
                    e
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
