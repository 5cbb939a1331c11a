//! Runtime-adjustable severity threshold
//!
//! A [`LevelController`] is a cheap, clonable handle over one atomic level.
//! Every clone observes and mutates the same value, which is how a logger and
//! its `with` children share a threshold.

use super::error::Result;
use super::log_level::LogLevel;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Callback invoked with the new text of a watched key
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// External key-value change notification source
///
/// The logging core only needs to be told when a key changes; it never reads
/// the configuration system directly.
pub trait ChangeFeed: Send + Sync {
    fn on_change(&self, key: &str, callback: ChangeCallback);
}

#[derive(Debug, Clone)]
pub struct LevelController {
    level: Arc<AtomicU8>,
}

impl LevelController {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level as u8)),
        }
    }

    #[inline]
    pub fn get(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Parse `text` as a level name and apply it
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::InvalidLevel`](super::LoggerError::InvalidLevel)
    /// and leaves the current level untouched when the text is unknown.
    pub fn parse_and_set(&self, text: &str) -> Result<()> {
        let level = text.parse::<LogLevel>()?;
        self.set(level);
        Ok(())
    }

    /// Whether a record at `level` passes this threshold
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.get()
    }

    /// Follow `key` on `feed`
    ///
    /// Invalid text is reported as a warning and ignored.
    pub fn subscribe(&self, feed: &dyn ChangeFeed, key: &str) {
        let controller = self.clone();
        let watched = key.to_string();
        feed.on_change(
            key,
            Arc::new(move |text| {
                if let Err(e) = controller.parse_and_set(text) {
                    eprintln!(
                        "[LOGGER WARNING] Ignoring level update for '{}': {}. Level stays {}.",
                        watched,
                        e,
                        controller.get()
                    );
                }
            }),
        );
    }

    /// Whether two handles control the same level
    pub fn same_as(&self, other: &LevelController) -> bool {
        Arc::ptr_eq(&self.level, &other.level)
    }
}

impl Default for LevelController {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

/// In-process [`ChangeFeed`] backed by a key-value map
///
/// `set` stores the value and synchronously invokes every callback registered
/// for that key.
///
/// # Example
///
/// ```
/// use sparrow_log::core::{LevelController, LogLevel, MemoryFeed};
///
/// let feed = MemoryFeed::new();
/// let level = LevelController::new(LogLevel::Info);
/// level.subscribe(&feed, "app.logger.level");
///
/// feed.set("app.logger.level", "error");
/// assert_eq!(level.get(), LogLevel::Error);
/// ```
#[derive(Default)]
pub struct MemoryFeed {
    values: RwLock<HashMap<String, String>>,
    callbacks: RwLock<HashMap<String, Vec<ChangeCallback>>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        self.values.write().insert(key.clone(), value.clone());

        // Clone out so callbacks may register further watchers
        let callbacks = self.callbacks.read().get(&key).cloned().unwrap_or_default();
        for callback in callbacks {
            callback(&value);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

impl ChangeFeed for MemoryFeed {
    fn on_change(&self, key: &str, callback: ChangeCallback) {
        self.callbacks
            .write()
            .entry(key.to_string())
            .or_default()
            .push(callback);
    }
}
