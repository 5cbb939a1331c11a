//! # sparrow_log
//!
//! Structured, leveled logging with a console stream and a rotating file as
//! destinations.
//!
//! ## Features
//!
//! - **Structured records**: typed fields, JSON or tab-separated console output
//! - **Rotation**: by size, age or interval, with bounded and optionally gzipped archives
//! - **Async buffering**: callers never wait on disk I/O unless the buffer is full
//! - **Runtime level control**: shared atomic level, optionally driven by a change feed
//!
//! ## Example
//!
//! ```
//! use sparrow_log::prelude::*;
//!
//! let config = Config {
//!     prefix: "api".to_string(),
//!     ..Config::default()
//! };
//! let (logger, guard) = config.build().unwrap();
//!
//! logger.info("listening", &[Field::int("port", 8080)]);
//! sparrow_log::warn!(logger, "cache at {}% capacity", 91);
//!
//! guard.close().unwrap();
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        default_logger, Config, Field, FieldValue, LevelController, LogLevel, Logger,
        LoggerBuilder, LoggerError, Result, ShutdownGuard,
    };
}

pub use crate::core::{
    default_logger, set_default_logger, Caller, ChangeCallback, ChangeFeed, Config, Encoder,
    EncoderConfig, Field, FieldValue, LevelController, LevelStyle, LogLevel, LogRecord, Logger,
    LoggerBuilder, LoggerError, LoggerMetrics, MemoryFeed, MemorySink, OutputFormat, Result,
    ShutdownGuard, Sink, TimestampFormat, WriteSyncer,
};
pub use crate::sinks::{
    BufferOptions, BufferedWriteSyncer, ConsoleSink, RotatingFileSink, RotationPolicy,
};
