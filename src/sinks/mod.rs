//! Sink implementations
//!
//! - [`ConsoleSink`]: stdout or stderr
//! - [`RotatingFileSink`]: size, age and interval based file rotation
//! - [`BufferedWriteSyncer`]: asynchronous buffering around any sink

pub mod buffered;
pub mod console;
pub mod rotating_file;

pub use buffered::{
    BufferOptions, BufferedWriteSyncer, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL,
};
pub use console::{ConsoleSink, ConsoleStream};
pub use rotating_file::{RotatingFileSink, RotationPolicy};
