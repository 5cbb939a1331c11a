//! Byte destinations for encoded records
//!
//! - [`Sink`]: a raw resource (file, stream), exclusively owned by one wrapper
//! - [`WriteSyncer`]: a shared, thread-safe handle the fan-out writes through

use super::error::Result;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

pub trait Sink: Send {
    /// Write one batch of encoded bytes, returning how many were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    /// Push written bytes down to the underlying resource
    fn sync(&mut self) -> Result<()>;
    /// Release the underlying resource; writes after this may reopen it
    fn close(&mut self) -> Result<()> {
        self.sync()
    }
    fn name(&self) -> &str;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub trait WriteSyncer: Send + Sync {
    fn write(&self, buf: &[u8]) -> Result<usize>;
    fn sync(&self) -> Result<()>;
    fn close(&self) -> Result<()> {
        self.sync()
    }
    fn name(&self) -> &str;
}

/// Synchronous [`WriteSyncer`] serializing access to a sink with a mutex
pub struct Locked<S: Sink> {
    name: String,
    inner: Mutex<S>,
}

impl<S: Sink> Locked<S> {
    pub fn new(sink: S) -> Self {
        Self {
            name: sink.name().to_string(),
            inner: Mutex::new(sink),
        }
    }
}

impl<S: Sink> WriteSyncer for Locked<S> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.inner.lock().write(buf)
    }

    fn sync(&self) -> Result<()> {
        self.inner.lock().sync()
    }

    fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<W: WriteSyncer + ?Sized> WriteSyncer for Arc<W> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// In-memory sink whose contents can be read back through any clone
///
/// Useful for embedding the logger in tests or capturing console output.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
    syncs: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().clone()
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents_string().lines().map(str::to_string).collect()
    }

    pub fn sync_count(&self) -> usize {
        *self.syncs.lock()
    }
}

impl Sink for MemorySink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.buf.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&mut self) -> Result<()> {
        *self.syncs.lock() += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
