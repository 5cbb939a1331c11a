//! Console sink implementation

use crate::core::{Result, Sink};
use std::io::Write;

/// Which standard stream a [`ConsoleSink`] writes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

/// Sink over a standard stream
///
/// Each write holds the process-wide stream lock for the whole batch, so
/// records from different loggers never interleave mid-line.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    stream: ConsoleStream,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::stdout()
    }

    pub fn stdout() -> Self {
        Self {
            stream: ConsoleStream::Stdout,
        }
    }

    pub fn stderr() -> Self {
        Self {
            stream: ConsoleStream::Stderr,
        }
    }

    pub fn stream(&self) -> ConsoleStream {
        self.stream
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self.stream {
            ConsoleStream::Stdout => std::io::stdout().lock().write_all(buf)?,
            ConsoleStream::Stderr => std::io::stderr().lock().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn sync(&mut self) -> Result<()> {
        match self.stream {
            ConsoleStream::Stdout => std::io::stdout().flush()?,
            ConsoleStream::Stderr => std::io::stderr().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
