//! Asynchronous buffering decorator
//!
//! [`BufferedWriteSyncer`] accepts writes into an in-memory buffer and moves
//! them to the wrapped sink from a background thread, either every
//! `flush_interval` or as soon as the buffer fills up.

use crate::core::error::{LoggerError, Result};
use crate::core::metrics::LoggerMetrics;
use crate::core::sink::{Sink, WriteSyncer};
use crate::core::tee::panic_message;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default buffer capacity (256 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Default interval between background flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// How long `close` waits for the flush thread before giving up on it
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Bytes held before a writer waits for the flush thread
    pub buffer_size: usize,
    pub flush_interval: Duration,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

struct State {
    pending: Vec<u8>,
    closed: bool,
}

struct Shared {
    name: String,
    /// Held across take-and-write so concurrent flushes cannot reorder bytes
    sink: Mutex<Box<dyn Sink>>,
    state: Mutex<State>,
    space: Condvar,
    wake: Sender<()>,
    capacity: usize,
    /// Longest a blocked writer waits before checking on the flush thread
    interval: Duration,
    worker_alive: AtomicBool,
    metrics: Arc<LoggerMetrics>,
}

impl Shared {
    /// Move pending bytes into `sink`; the caller holds the sink lock
    fn drain(&self, sink: &mut dyn Sink) -> Result<()> {
        let batch = std::mem::take(&mut self.state.lock().pending);
        self.space.notify_all();
        if batch.is_empty() {
            return Ok(());
        }
        sink.write(&batch).map(|_| ())
    }

    fn flush(&self) -> Result<()> {
        let mut sink = self.sink.lock();
        self.drain(&mut **sink)
    }

    /// Flush with the wrapped sink's panics contained and reported
    fn flush_isolated(&self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.flush())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.metrics.record_background_flush_failure();
                eprintln!("[LOGGER ERROR] Background flush to '{}' failed: {}", self.name, e);
            }
            Err(payload) => {
                self.metrics.record_background_flush_failure();
                eprintln!(
                    "[LOGGER CRITICAL] Sink '{}' panicked during flush: {}",
                    self.name,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

/// Marks the flush thread gone however it exits
struct AliveGuard<'a>(&'a AtomicBool);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sink wrapper that decouples callers from I/O latency
///
/// Writes return as soon as the bytes are buffered. A full buffer makes the
/// writer wait for the flush thread rather than drop data. After
/// [`close`](WriteSyncer::close), writes go straight to the wrapped sink.
///
/// # Examples
///
/// ```
/// use sparrow_log::core::{MemorySink, WriteSyncer};
/// use sparrow_log::sinks::{BufferOptions, BufferedWriteSyncer};
///
/// let memory = MemorySink::new();
/// let buffered = BufferedWriteSyncer::new(memory.clone(), BufferOptions::default()).unwrap();
///
/// buffered.write(b"queued\n").unwrap();
/// buffered.sync().unwrap();
/// assert_eq!(memory.contents_string(), "queued\n");
/// buffered.close().unwrap();
/// ```
pub struct BufferedWriteSyncer {
    shared: Arc<Shared>,
    stop: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl BufferedWriteSyncer {
    /// # Errors
    ///
    /// Returns error if the flush thread cannot be spawned
    pub fn new<S: Sink + 'static>(sink: S, options: BufferOptions) -> Result<Self> {
        Self::with_metrics(sink, options, Arc::new(LoggerMetrics::new()))
    }

    /// Like [`new`](Self::new), reporting background failures and
    /// backpressure into `metrics`
    ///
    /// # Errors
    ///
    /// Returns error if the flush thread cannot be spawned
    pub fn with_metrics<S: Sink + 'static>(
        sink: S,
        options: BufferOptions,
        metrics: Arc<LoggerMetrics>,
    ) -> Result<Self> {
        if options.buffer_size == 0 {
            return Err(LoggerError::config("buffer", "buffer_size must be positive"));
        }
        if options.flush_interval.is_zero() {
            return Err(LoggerError::config("buffer", "flush_interval must be positive"));
        }

        let (wake, wake_rx) = bounded(1);
        let (stop, stop_rx) = bounded::<()>(0);
        let shared = Arc::new(Shared {
            name: sink.name().to_string(),
            sink: Mutex::new(Box::new(sink)),
            state: Mutex::new(State {
                pending: Vec::with_capacity(options.buffer_size),
                closed: false,
            }),
            space: Condvar::new(),
            wake,
            capacity: options.buffer_size,
            interval: options.flush_interval,
            worker_alive: AtomicBool::new(true),
            metrics,
        });

        let worker_shared = Arc::clone(&shared);
        let interval = options.flush_interval;
        let worker = thread::Builder::new()
            .name(format!("log-flush-{}", shared.name))
            .spawn(move || run_flusher(&worker_shared, &wake_rx, &stop_rx, interval))
            .map_err(|e| LoggerError::io_operation("spawning flush thread", "buffered sink", e))?;

        Ok(Self {
            shared,
            stop: Mutex::new(Some(stop)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Bytes accepted but not yet handed to the wrapped sink
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn metrics(&self) -> &Arc<LoggerMetrics> {
        &self.shared.metrics
    }

    fn stop_worker(&self) {
        drop(self.stop.lock().take());

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Flush thread panicked during shutdown: {:?}", e);
                }
                return;
            }
            if start.elapsed() >= SHUTDOWN_TIMEOUT {
                eprintln!(
                    "[LOGGER WARNING] Flush thread for '{}' did not finish within {:?}",
                    self.shared.name, SHUTDOWN_TIMEOUT
                );
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

fn run_flusher(shared: &Shared, wake: &Receiver<()>, stop: &Receiver<()>, interval: Duration) {
    let _alive = AliveGuard(&shared.worker_alive);
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => {}
            recv(wake) -> _ => {}
            recv(stop) -> _ => break,
        }
        shared.flush_isolated();
    }
}

impl WriteSyncer for BufferedWriteSyncer {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut state = self.shared.state.lock();
        loop {
            if state.closed {
                drop(state);
                return self.shared.sink.lock().write(buf);
            }
            // An oversized record still goes through once the buffer is empty
            if state.pending.is_empty() || state.pending.len() + buf.len() <= self.shared.capacity
            {
                state.pending.extend_from_slice(buf);
                return Ok(buf.len());
            }
            self.shared.metrics.record_block();
            if !self.shared.worker_alive.load(Ordering::Acquire) {
                // No flush thread left to make room; drain on this thread
                drop(state);
                self.shared.flush()?;
                state = self.shared.state.lock();
                continue;
            }
            let _ = self.shared.wake.try_send(());
            self.shared.space.wait_for(&mut state, self.shared.interval);
        }
    }

    fn sync(&self) -> Result<()> {
        let mut sink = self.shared.sink.lock();
        let drained = self.shared.drain(&mut **sink);
        let synced = sink.sync();
        drained.and(synced)
    }

    /// Stop the flush thread, drain the buffer and close the wrapped sink
    ///
    /// Calling this more than once is a no-op.
    fn close(&self) -> Result<()> {
        self.stop_worker();

        let mut sink = self.shared.sink.lock();
        let batch = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.pending)
        };
        self.shared.space.notify_all();

        let finished = panic::catch_unwind(AssertUnwindSafe(|| {
            let written = if batch.is_empty() {
                Ok(())
            } else {
                sink.write(&batch).map(|_| ())
            };
            let closed = sink.close();
            written.and(closed)
        }));
        finished.unwrap_or_else(|payload| {
            Err(LoggerError::writer(format!(
                "sink '{}' panicked during close: {}",
                self.shared.name,
                panic_message(payload.as_ref())
            )))
        })
    }

    fn name(&self) -> &str {
        &self.shared.name
    }
}

impl Drop for BufferedWriteSyncer {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!(
                "[LOGGER ERROR] Failed to close '{}' during shutdown: {}",
                self.shared.name, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::MemorySink;

    fn options(buffer_size: usize, flush_ms: u64) -> BufferOptions {
        BufferOptions {
            buffer_size,
            flush_interval: Duration::from_millis(flush_ms),
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> Result<usize> {
            Err(LoggerError::writer("disk full"))
        }

        fn sync(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct PanickingSink;

    impl Sink for PanickingSink {
        fn write(&mut self, _buf: &[u8]) -> Result<usize> {
            panic!("disk driver bug");
        }

        fn sync(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_rejects_zero_options() {
        assert!(BufferedWriteSyncer::new(MemorySink::new(), options(0, 100)).is_err());
        assert!(BufferedWriteSyncer::new(MemorySink::new(), options(1024, 0)).is_err());
    }

    #[test]
    fn test_writes_buffer_until_sync() {
        let memory = MemorySink::new();
        // Long interval so only explicit syncs move data
        let buffered = BufferedWriteSyncer::new(memory.clone(), options(4096, 60_000)).unwrap();

        buffered.write(b"one\n").unwrap();
        buffered.write(b"two\n").unwrap();
        assert_eq!(buffered.pending(), 8);
        assert!(memory.contents().is_empty());

        buffered.sync().unwrap();
        assert_eq!(memory.contents_string(), "one\ntwo\n");
        assert_eq!(memory.sync_count(), 1);

        // Idempotent when nothing new was written
        buffered.sync().unwrap();
        assert_eq!(memory.contents_string(), "one\ntwo\n");
    }

    #[test]
    fn test_periodic_flush() {
        let memory = MemorySink::new();
        let buffered = BufferedWriteSyncer::new(memory.clone(), options(4096, 10)).unwrap();

        buffered.write(b"tick\n").unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while memory.contents().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(memory.contents_string(), "tick\n");
    }

    #[test]
    fn test_close_drains_everything() {
        let memory = MemorySink::new();
        let buffered = BufferedWriteSyncer::new(memory.clone(), options(1 << 20, 60_000)).unwrap();

        for i in 0..500 {
            buffered.write(format!("record {}\n", i).as_bytes()).unwrap();
        }
        buffered.close().unwrap();

        let lines = memory.lines();
        assert_eq!(lines.len(), 500);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line, &format!("record {}", i));
        }

        // Second close is a no-op
        buffered.close().unwrap();
        assert_eq!(memory.lines().len(), 500);
    }

    #[test]
    fn test_writes_after_close_go_direct() {
        let memory = MemorySink::new();
        let buffered = BufferedWriteSyncer::new(memory.clone(), options(4096, 60_000)).unwrap();
        buffered.close().unwrap();

        buffered.write(b"late\n").unwrap();
        assert_eq!(buffered.pending(), 0);
        assert_eq!(memory.contents_string(), "late\n");
    }

    #[test]
    fn test_backpressure_keeps_order() {
        let memory = MemorySink::new();
        // Tiny buffer forces writers to wait on the flush thread
        let buffered =
            Arc::new(BufferedWriteSyncer::new(memory.clone(), options(64, 60_000)).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffered = Arc::clone(&buffered);
                thread::spawn(move || {
                    for i in 0..100 {
                        let line = format!("t{}-{:03}\n", t, i);
                        buffered.write(line.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        buffered.close().unwrap();

        let lines = memory.lines();
        assert_eq!(lines.len(), 400);
        assert!(buffered.metrics().block_events() > 0);

        // Per-thread order survives the buffer
        for t in 0..4 {
            let prefix = format!("t{}-", t);
            let seq: Vec<_> = lines.iter().filter(|l| l.starts_with(&prefix)).collect();
            let expected: Vec<_> = (0..100).map(|i| format!("t{}-{:03}", t, i)).collect();
            assert_eq!(seq.len(), 100);
            assert!(seq.iter().zip(&expected).all(|(a, b)| *a == b));
        }
    }

    #[test]
    fn test_background_failure_recorded() {
        let metrics = Arc::new(LoggerMetrics::new());
        let buffered =
            BufferedWriteSyncer::with_metrics(FailingSink, options(4096, 5), Arc::clone(&metrics))
                .unwrap();

        buffered.write(b"lost\n").unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while metrics.background_flush_failures() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(metrics.background_flush_failures() >= 1);
        assert_eq!(buffered.name(), "failing");
    }

    #[test]
    fn test_panicking_sink_never_blocks_writers() {
        let metrics = Arc::new(LoggerMetrics::new());
        let buffered = Arc::new(
            BufferedWriteSyncer::with_metrics(PanickingSink, options(64, 5), Arc::clone(&metrics))
                .unwrap(),
        );

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let writer = {
            let buffered = Arc::clone(&buffered);
            thread::spawn(move || {
                for i in 0..100 {
                    let _ = buffered.write(format!("record {:03}\n", i).as_bytes());
                }
                let _ = done_tx.send(());
            })
        };

        assert!(
            done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
            "Writer stalled behind a panicking sink"
        );
        writer.join().unwrap();
        assert!(metrics.background_flush_failures() >= 1);
        assert!(buffered.shared.worker_alive.load(Ordering::Acquire));

    }

    #[test]
    fn test_close_reports_panicking_sink() {
        let buffered = BufferedWriteSyncer::new(PanickingSink, options(4096, 60_000)).unwrap();
        buffered.write(b"leftover\n").unwrap();

        assert!(matches!(buffered.close(), Err(LoggerError::WriterError(_))));
        // Already closed; dropping does not touch the sink again
        assert!(buffered.close().is_ok());
    }

    #[test]
    fn test_writer_drains_inline_without_flush_thread() {
        let memory = MemorySink::new();
        let buffered = BufferedWriteSyncer::new(memory.clone(), options(16, 60_000)).unwrap();
        buffered.shared.worker_alive.store(false, Ordering::Release);

        for i in 0..10 {
            buffered.write(format!("line {}\n", i).as_bytes()).unwrap();
        }
        buffered.sync().unwrap();

        let expected: Vec<_> = (0..10).map(|i| format!("line {}", i)).collect();
        assert_eq!(memory.lines(), expected);
    }
}
