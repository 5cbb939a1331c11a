//! Rotating file sink
//!
//! Appends to `dir/name` and rotates the file when it grows too large, gets
//! too old, or was closed. Archives are numbered: `name.1` is the newest,
//! `name.N` the oldest; optionally gzip-compressed as `name.N.gz`.

use crate::core::error::{LoggerError, Result};
use crate::core::sink::Sink;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const MAX_DELETION_FAILURES: usize = 5;

/// When to rotate and how many archives to keep
///
/// # Examples
///
/// ```
/// use sparrow_log::sinks::RotationPolicy;
/// use std::time::Duration;
///
/// let policy = RotationPolicy::new()
///     .with_max_size(50 * 1024 * 1024)
///     .with_max_age(Duration::from_secs(24 * 3600))
///     .with_max_backups(7)
///     .with_compression(true);
/// assert_eq!(policy.max_backups, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the active file holds this many bytes (0 disables)
    pub max_bytes: u64,
    /// Rotate once the active file is this old; also prunes older archives
    pub max_age: Option<Duration>,
    /// Rotate at this fixed period regardless of size
    pub interval: Option<Duration>,
    /// Archives to keep (0 keeps all)
    pub max_backups: usize,
    /// Gzip archives after rotation
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 500 * 1024 * 1024,
            max_age: Some(Duration::from_secs(24 * 3600)),
            interval: Some(Duration::from_secs(24 * 3600)),
            max_backups: 10,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that never rotates on its own (only after `close`)
    #[must_use]
    pub fn never() -> Self {
        Self {
            max_bytes: 0,
            max_age: None,
            interval: None,
            max_backups: 0,
            compress: false,
        }
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

/// File sink with size/age/interval rotation and bounded archives
///
/// # Examples
///
/// ```no_run
/// use sparrow_log::sinks::{RotatingFileSink, RotationPolicy};
///
/// let sink = RotatingFileSink::with_policy(
///     "/var/log/app/server.log",
///     RotationPolicy::new().with_max_size(10 * 1024 * 1024).with_max_backups(3),
/// )
/// .unwrap();
/// ```
pub struct RotatingFileSink {
    base_path: PathBuf,
    policy: RotationPolicy,
    file: Option<File>,
    current_size: u64,
    opened_at: SystemTime,
    /// Set by `close`; the next write starts a fresh file
    closed: bool,
    /// Counter for consecutive deletion failures (reset on successful deletion)
    deletion_failure_count: usize,
}

impl RotatingFileSink {
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or opened
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or opened
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::file_sink(
                    base_path.display().to_string(),
                    format!("Failed to create directory '{}': {}", parent.display(), e),
                )
            })?;
        }

        let (file, current_size, opened_at) = Self::open(&base_path)?;

        Ok(Self {
            base_path,
            policy,
            file: Some(file),
            current_size,
            opened_at,
            closed: false,
            deletion_failure_count: 0,
        })
    }

    /// Open for append, reporting the current size and when the file began
    fn open(path: &Path) -> Result<(File, u64, SystemTime)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
            })?;

        let metadata = file.metadata().map_err(|e| {
            LoggerError::file_sink(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?;
        let started = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or_else(|_| SystemTime::now());
        Ok((file, metadata.len(), started))
    }

    fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.opened_at)
            .unwrap_or(Duration::ZERO)
    }

    fn should_rotate(&self) -> bool {
        if self.closed {
            return true;
        }
        if self.current_size == 0 {
            return false;
        }
        let size_exceeded =
            self.policy.max_bytes > 0 && self.current_size >= self.policy.max_bytes;
        let age = self.age();
        let too_old = self.policy.max_age.is_some_and(|max| age >= max);
        let interval_elapsed = self.policy.interval.is_some_and(|every| age >= every);
        size_exceeded || too_old || interval_elapsed
    }

    /// Archive the active file and open a fresh one
    ///
    /// On failure the previous handle stays installed so writes can continue.
    fn rotate(&mut self) -> Result<()> {
        let previous = self.file.take();
        if let Some(ref file) = previous {
            // Unwritten data must reach the archive, not the new file
            if let Err(e) = file.sync_data() {
                eprintln!(
                    "[LOGGER WARNING] Failed to sync {} before rotation: {}",
                    self.base_path.display(),
                    e
                );
            }
        }

        match self.archive_and_reopen() {
            Ok((file, size, opened_at)) => {
                drop(previous);
                self.file = Some(file);
                self.current_size = size;
                self.opened_at = opened_at;
                self.closed = false;
                self.prune_expired();
                Ok(())
            }
            Err(e) => {
                self.file = previous;
                Err(e)
            }
        }
    }

    fn archive_and_reopen(&mut self) -> Result<(File, u64, SystemTime)> {
        let has_content = fs::metadata(&self.base_path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        if has_content {
            self.drop_oldest_backup()?;
            self.shift_backups()?;

            let first = self.backup_path(1);
            fs::rename(&self.base_path, &first).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to archive current log file: {}", e),
                )
            })?;

            if self.policy.compress {
                compress_file(&first, &gz_path(&first))?;
            }
        }

        let (file, _, _) = Self::open(&self.base_path).map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("Failed to create new log file: {}", e),
            )
        })?;
        Ok((file, 0, SystemTime::now()))
    }

    /// Delete the archive that would fall past `max_backups` after shifting
    fn drop_oldest_backup(&mut self) -> Result<()> {
        if self.policy.max_backups == 0 {
            return Ok(());
        }

        let oldest = self.backup_path(self.policy.max_backups);
        let mut deletion_failed = false;
        for candidate in [gz_path(&oldest), oldest] {
            if candidate.exists() {
                if let Err(e) = fs::remove_file(&candidate) {
                    deletion_failed = true;
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove oldest backup {}: {} (failure #{}/{})",
                        candidate.display(),
                        e,
                        self.deletion_failure_count + 1,
                        MAX_DELETION_FAILURES
                    );
                }
            }
        }

        if deletion_failed {
            self.deletion_failure_count += 1;
            if self.deletion_failure_count >= MAX_DELETION_FAILURES {
                return Err(LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!(
                        "Rotation aborted: failed to delete old backup files {} consecutive times",
                        self.deletion_failure_count
                    ),
                ));
            }
        } else {
            self.deletion_failure_count = 0;
        }
        Ok(())
    }

    /// Move every archive one index up, newest last so nothing is overwritten
    fn shift_backups(&self) -> Result<()> {
        let top = if self.policy.max_backups > 0 {
            self.policy.max_backups.saturating_sub(1)
        } else {
            self.highest_backup_index()
        };

        for i in (1..=top).rev() {
            let from = self.backup_path(i);
            let to = self.backup_path(i + 1);
            let (from, to) = if gz_path(&from).exists() {
                (gz_path(&from), gz_path(&to))
            } else if from.exists() {
                (from, to)
            } else {
                continue;
            };

            if fs::rename(&from, &to).is_err() {
                // Some platforms refuse to rename over an existing file
                let _ = fs::remove_file(&to);
                fs::rename(&from, &to).map_err(|e| {
                    LoggerError::file_rotation(
                        from.display().to_string(),
                        format!("Failed to shift backup file: {}", e),
                    )
                })?;
            }
        }
        Ok(())
    }

    fn highest_backup_index(&self) -> usize {
        let mut index = 0;
        while self.backup_exists(index + 1) {
            index += 1;
        }
        index
    }

    fn backup_exists(&self, index: usize) -> bool {
        let path = self.backup_path(index);
        path.exists() || gz_path(&path).exists()
    }

    /// Remove archives whose last write is older than `max_age`
    fn prune_expired(&self) {
        let Some(max_age) = self.policy.max_age else {
            return;
        };
        let now = SystemTime::now();
        for path in self.backups() {
            let expired = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove expired backup {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
    }

    /// Get backup file path for given index
    fn backup_path(&self, index: usize) -> PathBuf {
        let mut path = self.base_path.clone();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("default.log")
            .to_string();
        path.set_file_name(format!("{}.{}", filename, index));
        path
    }

    /// Existing archives, oldest first
    #[must_use]
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let top = self.highest_backup_index().max(self.policy.max_backups);
        for index in (1..=top).rev() {
            let path = self.backup_path(index);
            if path.exists() {
                found.push(path);
            } else if gz_path(&path).exists() {
                found.push(gz_path(&path));
            }
        }
        found
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// When the active file was started
    #[must_use]
    pub fn opened_at(&self) -> SystemTime {
        self.opened_at
    }
}

impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.should_rotate() {
            if let Err(e) = self.rotate() {
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );

                if self.file.is_none() {
                    match Self::open(&self.base_path) {
                        Ok((file, size, _)) => {
                            self.file = Some(file);
                            self.current_size = size;
                        }
                        Err(reopen_err) => {
                            eprintln!(
                                "[LOGGER ERROR] Failed to reopen log file after rotation failure: {}",
                                reopen_err
                            );
                            return Err(e);
                        }
                    }
                }

                // Let the file outgrow its limits rather than retry on every write
                self.current_size = 0;
                self.opened_at = SystemTime::now();
                self.closed = false;
            }
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer not initialized"))?;
        file.write_all(buf).map_err(|e| {
            LoggerError::file_sink(
                self.base_path.display().to_string(),
                format!("Failed to write log data: {}", e),
            )
        })?;
        self.current_size += buf.len() as u64;
        Ok(buf.len())
    }

    fn sync(&mut self) -> Result<()> {
        if let Some(ref file) = self.file {
            file.sync_data().map_err(|e| {
                LoggerError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to sync: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let result = self.sync();
        if self.file.take().is_some() {
            self.closed = true;
        }
        result
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        let _ = self.sync();
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` into `target`, removing the original only on success
fn compress_file(path: &Path, target: &Path) -> Result<()> {
    let temp = target.with_extension("gz.tmp");
    let result = (|| -> std::io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&temp)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
        std::io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&temp, target)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compressing log archive",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed {} but failed to remove the original: {}",
            path.display(),
            e
        );
    }
    Ok(())
}
