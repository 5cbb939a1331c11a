//! Core logger types and traits

pub mod builder;
pub mod config;
pub mod encoder;
pub mod error;
pub mod field;
pub mod level_controller;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod record;
pub mod sink;
pub mod tee;
pub mod timestamp;

pub use builder::{default_logger, set_default_logger, LoggerBuilder, ShutdownGuard};
pub use config::Config;
pub use encoder::{Encoder, EncoderConfig, LevelStyle, OutputFormat, DEBUG_MESSAGE_WIDTH};
pub use error::{LoggerError, Result};
pub use field::{Field, FieldValue};
pub use level_controller::{ChangeCallback, ChangeFeed, LevelController, MemoryFeed};
pub use log_level::LogLevel;
pub use logger::Logger;
pub use metrics::LoggerMetrics;
pub use record::{Caller, LogRecord};
pub use sink::{Locked, MemorySink, Sink, WriteSyncer};
pub use tee::{Tee, TeeEntry};
pub use timestamp::TimestampFormat;
