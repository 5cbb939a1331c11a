//! Logger facade
//!
//! [`Logger`] is a cheap, clonable handle. Clones and children created with
//! [`Logger::with`] or [`Logger::named`] share the sinks and the level; each
//! carries its own bound fields.

use super::config::Config;
use super::encoder::paint;
use super::error::Result;
use super::field::{Field, FieldValue};
use super::level_controller::{ChangeFeed, LevelController};
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::record::{capture_stacktrace, Caller, LogRecord};
use super::sink::WriteSyncer;
use super::tee::Tee;
use colored::Color;
use std::fmt;
use std::io::Write;
use std::panic::Location;
use std::sync::Arc;

struct LoggerCore {
    tee: Tee,
    level: LevelController,
    config: Config,
    /// Where debug-mode diagnostics go; stdout when no console sink exists
    diagnostics: Option<Arc<dyn WriteSyncer>>,
}

/// Structured, leveled logger
///
/// # Examples
///
/// ```
/// use sparrow_log::{Config, Field};
///
/// let config = Config {
///     enable_console: true,
///     enable_file: false,
///     async_write: false,
///     ..Config::default()
/// };
/// let (logger, guard) = config.build().unwrap();
///
/// logger.info("server started", &[Field::int("port", 8080)]);
/// let requests = logger.with(&[Field::string("component", "http")]);
/// requests.warnw("slow request", [("elapsed_ms", 1250_i64)]);
///
/// guard.close().unwrap();
/// ```
#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
    name: Option<String>,
    fields: Arc<Vec<Field>>,
}

impl Logger {
    pub(crate) fn from_parts(
        tee: Tee,
        level: LevelController,
        config: Config,
        diagnostics: Option<Arc<dyn WriteSyncer>>,
    ) -> Self {
        let name = Some(config.prefix.clone()).filter(|p| !p.is_empty());
        let fields = Arc::new(config.fields.clone());
        Self {
            core: Arc::new(LoggerCore {
                tee,
                level,
                config,
                diagnostics,
            }),
            name,
            fields,
        }
    }

    /// Logger with no sinks; every record is discarded
    ///
    /// `panic` and `fatal` still panic and exit.
    pub fn nop() -> Self {
        Self::from_parts(
            Tee::empty(),
            LevelController::default(),
            Config::default(),
            None,
        )
    }

    /// Child logger whose records carry `fields` after this logger's own
    pub fn with(&self, fields: &[Field]) -> Logger {
        let mut bound = Vec::with_capacity(self.fields.len() + fields.len());
        bound.extend_from_slice(&self.fields);
        bound.extend_from_slice(fields);
        Logger {
            core: Arc::clone(&self.core),
            name: self.name.clone(),
            fields: Arc::new(bound),
        }
    }

    /// Child logger named `parent.name` (or `name` at the root)
    pub fn named(&self, name: &str) -> Logger {
        let name = match (&self.name, name.is_empty()) {
            (_, true) => self.name.clone(),
            (Some(parent), false) => Some(format!("{}.{}", parent, name)),
            (None, false) => Some(name.to_string()),
        };
        Logger {
            core: Arc::clone(&self.core),
            name,
            fields: Arc::clone(&self.fields),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Fields bound to every record of this logger
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn set_level(&self, level: LogLevel) {
        self.core.level.set(level);
    }

    pub fn level(&self) -> LogLevel {
        self.core.level.get()
    }

    /// Handle on the shared level; updates are seen by every related logger
    pub fn level_controller(&self) -> &LevelController {
        &self.core.level
    }

    /// Whether a record at `level` would reach at least one sink
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.core.level.enabled(level) && self.core.tee.enabled(level)
    }

    pub fn is_debug_mode(&self) -> bool {
        self.core.config.debug
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn metrics(&self) -> &Arc<LoggerMetrics> {
        self.core.tee.metrics()
    }

    /// Drain buffers and sync every sink
    ///
    /// # Errors
    ///
    /// Returns the first sink error after every sink has been tried
    pub fn flush(&self) -> Result<()> {
        self.core.tee.sync()
    }

    /// Follow `key` on `feed`, applying each new value as the level
    ///
    /// Every accepted update is logged as `update level`; unparsable values
    /// are logged as a warning and leave the level unchanged.
    pub fn auto_level(&self, feed: &dyn ChangeFeed, key: &str) {
        let logger = self.clone();
        let key_name = key.to_string();
        feed.on_change(
            key,
            Arc::new(move |value: &str| {
                let text = value.trim().to_lowercase();
                if text.is_empty() {
                    return;
                }
                logger.info(
                    "update level",
                    &[
                        Field::string("level", text.as_str()),
                        Field::string("name", logger.core.config.name.as_str()),
                    ],
                );
                if let Err(e) = logger.core.level.parse_and_set(&text) {
                    logger.warn(
                        "ignoring level update",
                        &[
                            Field::string("key", key_name.as_str()),
                            Field::string("error", e.to_string()),
                        ],
                    );
                }
            }),
        );
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(level, msg.into(), fields);
    }

    #[track_caller]
    pub fn logf(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if level < LogLevel::DPanic && !self.enabled(level) {
            return;
        }
        self.dispatch(level, fmt::format(args), &[]);
    }

    #[track_caller]
    pub fn logw<I, K, V>(&self, level: LogLevel, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        if level < LogLevel::DPanic && !self.enabled(level) {
            return;
        }
        self.dispatch(level, msg.into(), &keyed(pairs));
    }

    #[track_caller]
    pub fn debug(&self, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(LogLevel::Debug, msg.into(), fields);
    }

    #[track_caller]
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.logf(LogLevel::Debug, args);
    }

    #[track_caller]
    pub fn debugw<I, K, V>(&self, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.logw(LogLevel::Debug, msg, pairs);
    }

    #[track_caller]
    pub fn info(&self, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(LogLevel::Info, msg.into(), fields);
    }

    #[track_caller]
    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.logf(LogLevel::Info, args);
    }

    #[track_caller]
    pub fn infow<I, K, V>(&self, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.logw(LogLevel::Info, msg, pairs);
    }

    #[track_caller]
    pub fn warn(&self, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(LogLevel::Warn, msg.into(), fields);
    }

    #[track_caller]
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.logf(LogLevel::Warn, args);
    }

    #[track_caller]
    pub fn warnw<I, K, V>(&self, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.logw(LogLevel::Warn, msg, pairs);
    }

    #[track_caller]
    pub fn error(&self, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(LogLevel::Error, msg.into(), fields);
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.logf(LogLevel::Error, args);
    }

    #[track_caller]
    pub fn errorw<I, K, V>(&self, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.logw(LogLevel::Error, msg, pairs);
    }

    /// Log, then panic outside debug mode
    #[track_caller]
    pub fn dpanic(&self, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(LogLevel::DPanic, msg.into(), fields);
    }

    #[track_caller]
    pub fn dpanicf(&self, args: fmt::Arguments<'_>) {
        self.logf(LogLevel::DPanic, args);
    }

    #[track_caller]
    pub fn dpanicw<I, K, V>(&self, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.logw(LogLevel::DPanic, msg, pairs);
    }

    /// Log, flush and panic
    ///
    /// In debug mode the record is logged and a diagnostic block is printed
    /// to the console instead of panicking.
    #[track_caller]
    pub fn panic(&self, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(LogLevel::Panic, msg.into(), fields);
    }

    #[track_caller]
    pub fn panicf(&self, args: fmt::Arguments<'_>) {
        self.logf(LogLevel::Panic, args);
    }

    #[track_caller]
    pub fn panicw<I, K, V>(&self, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.logw(LogLevel::Panic, msg, pairs);
    }

    /// Log, flush and exit the process with status 1
    ///
    /// In debug mode nothing is logged: a diagnostic block is printed to the
    /// console and the call returns.
    #[track_caller]
    pub fn fatal(&self, msg: impl Into<String>, fields: &[Field]) {
        self.dispatch(LogLevel::Fatal, msg.into(), fields);
    }

    #[track_caller]
    pub fn fatalf(&self, args: fmt::Arguments<'_>) {
        self.logf(LogLevel::Fatal, args);
    }

    #[track_caller]
    pub fn fatalw<I, K, V>(&self, msg: impl Into<String>, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.logw(LogLevel::Fatal, msg, pairs);
    }

    #[track_caller]
    fn dispatch(&self, level: LogLevel, message: String, fields: &[Field]) {
        let location = Location::caller();
        let debug_mode = self.is_debug_mode();

        match level {
            LogLevel::Fatal if debug_mode => self.print_diagnostic(&message, fields, location),
            LogLevel::Fatal => {
                self.emit(level, message, fields, location);
                self.flush_before_exit();
                std::process::exit(1);
            }
            LogLevel::DPanic | LogLevel::Panic if debug_mode => {
                self.emit(level, message.clone(), fields, location);
                self.print_diagnostic(&message, fields, location);
            }
            LogLevel::DPanic | LogLevel::Panic => {
                self.emit(level, message.clone(), fields, location);
                self.flush_before_exit();
                panic!("{}", message);
            }
            _ => self.emit(level, message, fields, location),
        }
    }

    fn emit(
        &self,
        level: LogLevel,
        message: String,
        fields: &[Field],
        location: &'static Location<'static>,
    ) {
        if !self.enabled(level) {
            return;
        }
        let config = &self.core.config;

        let mut all_fields = Vec::with_capacity(self.fields.len() + fields.len());
        all_fields.extend_from_slice(&self.fields);
        all_fields.extend_from_slice(fields);

        let mut record = LogRecord::new(level, message)
            .with_fields(all_fields)
            .with_logger_name(self.name.clone());
        if config.add_caller {
            record = record.with_caller(Caller::from_location(location));
        }
        if level >= LogLevel::DPanic {
            record = record.with_stacktrace(capture_stacktrace(config.caller_skip));
        }
        self.core.tee.emit(&record);
    }

    fn flush_before_exit(&self) {
        if let Err(e) = self.flush() {
            eprintln!("[LOGGER ERROR] Failed to flush before terminating: {}", e);
        }
    }

    /// Human-oriented dump of a terminal call, used in debug mode
    fn print_diagnostic(&self, message: &str, fields: &[Field], location: &Location<'_>) {
        let red = |text: &str| paint(Color::Red, text);
        let mut block = format!("{}: \n    {}: {}\n", red("panic"), red("msg"), message);
        block.push_str(&format!(
            "    {}: {}:{}\n",
            red("loc"),
            location.file(),
            location.line()
        ));
        for field in fields {
            block.push_str(&format!("    {}: {}\n", red(field.key.as_str()), field.value));
        }

        let written = match &self.core.diagnostics {
            Some(console) => console
                .write(block.as_bytes())
                .and_then(|_| console.sync()),
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(block.as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(Into::into)
            }
        };
        if let Err(e) = written {
            eprintln!("[LOGGER ERROR] Failed to print diagnostic: {}", e);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("sinks", &self.core.tee.len())
            .field("fields", &self.fields.len())
            .field("debug", &self.is_debug_mode())
            .finish()
    }
}

fn keyed<I, K, V>(pairs: I) -> Vec<Field>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(key, value)| Field::new(key, value))
        .collect()
}
