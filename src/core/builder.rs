//! Turning a [`Config`] into a running [`Logger`]

use super::config::Config;
use super::encoder::{Encoder, EncoderConfig, LevelStyle, DEBUG_MESSAGE_WIDTH};
use super::error::Result;
use super::level_controller::{ChangeFeed, LevelController};
use super::logger::Logger;
use super::metrics::LoggerMetrics;
use super::sink::{Locked, Sink, WriteSyncer};
use super::tee::{Tee, TeeEntry};
use crate::sinks::{BufferedWriteSyncer, ConsoleSink, RotatingFileSink};
use chrono::Local;
use std::sync::{Arc, OnceLock};

type CloseFn = Box<dyn FnOnce() -> Result<()> + Send>;

/// Close hooks for every sink a build created
///
/// Call [`close`](Self::close) during shutdown to drain buffers and close
/// files; dropping the guard runs the same hooks and reports failures on
/// stderr.
#[must_use = "dropping the guard immediately closes every sink"]
#[derive(Default)]
pub struct ShutdownGuard {
    hooks: Vec<CloseFn>,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, hook: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in registration order
    ///
    /// # Errors
    ///
    /// Returns the first failure after all hooks have run
    pub fn close(mut self) -> Result<()> {
        self.run_hooks()
    }

    fn run_hooks(&mut self) -> Result<()> {
        let mut first_error = None;
        for hook in self.hooks.drain(..) {
            if let Err(e) = hook() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if let Err(e) = self.run_hooks() {
            eprintln!("[LOGGER ERROR] Failed to close sinks during shutdown: {}", e);
        }
    }
}

/// Builder for constructing a [`Logger`] from a [`Config`]
///
/// # Examples
///
/// ```
/// use sparrow_log::{Config, LoggerBuilder, MemoryFeed, MemorySink};
/// use std::sync::Arc;
///
/// let console = MemorySink::new();
/// let feed = Arc::new(MemoryFeed::new());
/// let config = Config {
///     async_write: false,
///     console_level: "debug".to_string(),
///     ..Config::default()
/// };
///
/// let (logger, guard) = LoggerBuilder::new(config)
///     .console(console.clone())
///     .change_feed(feed.clone(), "app.logger")
///     .build()
///     .unwrap();
///
/// feed.set("app.logger.level", "debug");
/// logger.debug("now visible", &[]);
/// guard.close().unwrap();
/// assert!(console.contents_string().contains("now visible"));
/// ```
pub struct LoggerBuilder {
    config: Config,
    console: Option<Box<dyn Sink>>,
    feed: Option<(Arc<dyn ChangeFeed>, String)>,
    metrics: Option<Arc<LoggerMetrics>>,
}

impl LoggerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            console: None,
            feed: None,
            metrics: None,
        }
    }

    /// Replace stdout as the console destination
    #[must_use]
    pub fn console<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.console = Some(Box::new(sink));
        self
    }

    /// Follow `<namespace>.level` on `feed` once built
    #[must_use]
    pub fn change_feed(mut self, feed: Arc<dyn ChangeFeed>, namespace: impl Into<String>) -> Self {
        self.feed = Some((feed, namespace.into()));
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<LoggerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// # Errors
    ///
    /// Fails on invalid configuration, when the log file cannot be opened, or
    /// when a flush thread cannot be started
    pub fn build(self) -> Result<(Logger, ShutdownGuard)> {
        let LoggerBuilder {
            config,
            console,
            feed,
            metrics,
        } = self;
        config.validate()?;

        let metrics = metrics.unwrap_or_default();
        let level = LevelController::new(config.level()?);
        let mut guard = ShutdownGuard::new();
        let mut entries = Vec::new();
        let mut diagnostics = None;

        if config.enable_console {
            let sink = console.unwrap_or_else(|| Box::new(ConsoleSink::stdout()));
            let writer = wrap(sink, &config, &metrics, &mut guard)?;
            let encoder_config = console_encoder_config(&config);
            let encoder = if config.console_json_format {
                Encoder::json(encoder_config)
            } else {
                Encoder::console(encoder_config)
            };
            diagnostics = Some(Arc::clone(&writer));
            entries.push(TeeEntry::new(
                encoder,
                writer,
                LevelController::new(config.console_level()?),
            ));
        }

        if config.enable_file {
            let path = config.file_path(&Local::now());
            let sink = RotatingFileSink::with_policy(&path, config.rotation_policy())?;
            let writer = wrap(Box::new(sink), &config, &metrics, &mut guard)?;
            // Files never carry color codes
            let encoder_config =
                console_encoder_config(&config).with_level_style(LevelStyle::Lowercase);
            let encoder = if config.file_json_format {
                Encoder::json(encoder_config)
            } else {
                Encoder::console(encoder_config)
            };
            entries.push(TeeEntry::new(encoder, writer, level.clone()));
        }

        let namespace = feed.as_ref().map(|(_, ns)| format!("{}.level", ns));
        let logger = Logger::from_parts(Tee::new(entries, metrics), level, config, diagnostics);
        if let (Some((feed, _)), Some(key)) = (feed, namespace) {
            logger.auto_level(feed.as_ref(), &key);
        }
        Ok((logger, guard))
    }
}

/// Encoder settings adjusted for debug mode
fn console_encoder_config(config: &Config) -> EncoderConfig {
    let encoder = config.encoder.clone();
    if config.debug {
        encoder
            .with_level_style(LevelStyle::CapitalColor)
            .with_message_width(Some(DEBUG_MESSAGE_WIDTH))
    } else {
        encoder
    }
}

/// Make `sink` shareable, buffering it in async mode, and register its close hook
fn wrap(
    sink: Box<dyn Sink>,
    config: &Config,
    metrics: &Arc<LoggerMetrics>,
    guard: &mut ShutdownGuard,
) -> Result<Arc<dyn WriteSyncer>> {
    let writer: Arc<dyn WriteSyncer> = if config.async_write {
        Arc::new(BufferedWriteSyncer::with_metrics(
            sink,
            config.buffer_options(),
            Arc::clone(metrics),
        )?)
    } else {
        Arc::new(Locked::new(sink))
    };

    let hook_writer = Arc::clone(&writer);
    guard.register(move || hook_writer.close());
    Ok(writer)
}

static DEFAULT_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Process-wide logger, built on first use
///
/// Unless [`set_default_logger`] ran first, this is a synchronous
/// console-only logger at `info`.
pub fn default_logger() -> &'static Logger {
    DEFAULT_LOGGER.get_or_init(|| {
        let config = Config {
            enable_console: true,
            enable_file: false,
            async_write: false,
            ..Config::default()
        };
        match LoggerBuilder::new(config).build() {
            // Closing a synchronous console only flushes stdout
            Ok((logger, _guard)) => logger,
            Err(e) => {
                eprintln!("[LOGGER ERROR] Failed to build default logger: {}", e);
                Logger::nop()
            }
        }
    })
}

/// Install `logger` as the process-wide default
///
/// # Errors
///
/// Hands the logger back if a default was already installed or built
pub fn set_default_logger(logger: Logger) -> std::result::Result<(), Logger> {
    DEFAULT_LOGGER.set(logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoggerError;
    use crate::core::level_controller::MemoryFeed;
    use crate::core::log_level::LogLevel;
    use crate::core::sink::MemorySink;
    use std::fs;
    use tempfile::tempdir;

    fn console_only(async_write: bool) -> Config {
        Config {
            enable_console: true,
            enable_file: false,
            async_write,
            ..Config::default()
        }
    }

    #[test]
    fn test_console_only_sync() {
        let console = MemorySink::new();
        let (logger, guard) = LoggerBuilder::new(console_only(false))
            .console(console.clone())
            .build()
            .unwrap();

        logger.info("ready", &[]);
        let lines = console.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\tinfo\t"));
        assert!(lines[0].contains("ready"));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_async_console_drains_on_close() {
        let console = MemorySink::new();
        let (logger, guard) = LoggerBuilder::new(console_only(true))
            .console(console.clone())
            .build()
            .unwrap();

        for i in 0..100 {
            logger.infof(format_args!("record {}", i));
        }
        guard.close().unwrap();
        assert_eq!(console.lines().len(), 100);
    }

    #[test]
    fn test_console_level_is_separate() {
        let console = MemorySink::new();
        let config = Config {
            level: "debug".to_string(),
            console_level: "warn".to_string(),
            ..console_only(false)
        };
        let (logger, _guard) = LoggerBuilder::new(config)
            .console(console.clone())
            .build()
            .unwrap();

        logger.info("hidden", &[]);
        logger.warn("shown", &[]);
        assert_eq!(console.lines().len(), 1);
        assert!(logger.enabled(LogLevel::Warn));
        assert!(!logger.enabled(LogLevel::Info));
    }

    #[test]
    fn test_console_level_below_logger_level_waits_for_logger() {
        let console = MemorySink::new();
        let config = Config {
            level: "info".to_string(),
            console_level: "debug".to_string(),
            ..console_only(false)
        };
        let (logger, _guard) = LoggerBuilder::new(config)
            .console(console.clone())
            .build()
            .unwrap();

        logger.debug("held back by logger level", &[]);
        assert!(console.lines().is_empty());

        logger.set_level(LogLevel::Debug);
        logger.debug("now admitted", &[]);
        assert_eq!(console.lines().len(), 1);
    }

    #[test]
    fn test_file_sink_writes_json() {
        let dir = tempdir().unwrap();
        let config = Config {
            enable_console: false,
            enable_file: true,
            async_write: false,
            dir: dir.path().join("logs").display().to_string(),
            name: "svc.log".to_string(),
            ..Config::default()
        };
        let (logger, guard) = config.build().unwrap();
        logger.warn("disk nearly full", &[]);
        guard.close().unwrap();

        let content = fs::read_to_string(dir.path().join("logs").join("svc.log")).unwrap();
        let record: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(record["lv"], "warn");
        assert_eq!(record["msg"], "disk nearly full");
    }

    #[test]
    fn test_debug_mode_encoders() {
        let console = MemorySink::new();
        let dir = tempdir().unwrap();
        let config = Config {
            enable_file: true,
            async_write: false,
            debug: true,
            dir: dir.path().display().to_string(),
            ..console_only(false)
        };
        let (logger, guard) = LoggerBuilder::new(config)
            .console(console.clone())
            .build()
            .unwrap();
        logger.info("short", &[]);
        guard.close().unwrap();

        let line = console.contents_string();
        assert!(line.contains("\x1b["));
        assert!(line.contains("INFO"));
        assert!(line.contains(&format!("{:<32}", "short")));

        let file = fs::read_to_string(dir.path().join("default.log")).unwrap();
        assert!(!file.contains("\x1b["));
        assert!(file.contains("\"lv\":\"info\""));
    }

    #[test]
    fn test_invalid_config_fails_build() {
        let config = Config {
            level: "loud".to_string(),
            ..console_only(false)
        };
        assert!(matches!(
            LoggerBuilder::new(config).build(),
            Err(LoggerError::InvalidLevel(_))
        ));

        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let config = Config {
            enable_file: true,
            dir: blocker.join("sub").display().to_string(),
            ..console_only(false)
        };
        assert!(matches!(
            config.build(),
            Err(LoggerError::FileSinkError { .. })
        ));
    }

    #[test]
    fn test_change_feed_namespace() {
        let feed = Arc::new(MemoryFeed::new());
        let (logger, _guard) = LoggerBuilder::new(console_only(false))
            .console(MemorySink::new())
            .change_feed(feed.clone(), "jobs.logger")
            .build()
            .unwrap();

        feed.set("jobs.logger.level", "error");
        assert_eq!(logger.level(), LogLevel::Error);
        feed.set("other.level", "debug");
        assert_eq!(logger.level(), LogLevel::Error);
    }

    #[test]
    fn test_guard_reports_first_error() {
        let mut guard = ShutdownGuard::new();
        guard.register(|| Ok(()));
        guard.register(|| Err(LoggerError::other("first")));
        guard.register(|| Err(LoggerError::other("second")));
        assert_eq!(guard.len(), 3);
        assert_eq!(guard.close().unwrap_err().to_string(), "first");
    }

    #[test]
    fn test_default_logger_is_shared() {
        let a = default_logger();
        let b = default_logger();
        assert!(std::ptr::eq(a, b));
        assert!(set_default_logger(Logger::nop()).is_err());
    }
}
