//! Named cross-process file locks.
//!
//! Locks live under `{storage_dir}/.locks/{name}.lock` and are held through OS
//! level file locking provided by the fs4 crate. A lock is released when its
//! [`NamedLock`] is dropped or explicitly [released](NamedLock::release).
//!
//! Two acquisition modes exist:
//!
//! - **Non-blocking**: a single attempt. Contention yields `Ok(None)`, which
//!   callers such as self-update and garbage collection treat as "skip this run".
//! - **Bounded wait**: retry with exponential backoff (10ms → 500ms) until the
//!   timeout expires. Used by the download path so it never races a collection.
//!
//! # Async Safety
//!
//! File opens and lock attempts run in `spawn_blocking` so a slow filesystem
//! never stalls the tokio runtime.

use crate::constants::{LOCKS_DIR, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use anyhow::{Context, Result, anyhow};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

/// Hands out named locks rooted at a storage directory.
#[derive(Debug, Clone)]
pub struct LockManager {
    locks_dir: PathBuf,
}

impl LockManager {
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            locks_dir: storage_dir.join(LOCKS_DIR),
        }
    }

    pub fn locks_dir(&self) -> &Path {
        &self.locks_dir
    }

    /// Make a single attempt to take the named lock.
    ///
    /// A lock held elsewhere yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// The locks directory or lock file cannot be created.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use multiwerf::lock::LockManager;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let locks = LockManager::new(Path::new("/home/user/.multiwerf"));
    /// match locks.try_acquire("gc").await? {
    ///     Some(_guard) => { /* exclusive section */ }
    ///     None => println!("another process is collecting garbage"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn try_acquire(&self, name: &str) -> Result<Option<NamedLock>> {
        let (file, path) = self.open_lock_file(name).await?;
        if try_lock(&file).await? {
            debug!(lock_name = %name, "Lock acquired");
            Ok(Some(NamedLock::new(name, path, file)))
        } else {
            debug!(lock_name = %name, "Lock is held by another process");
            Ok(None)
        }
    }

    /// Wait for the named lock with exponential backoff, failing after `timeout`.
    pub async fn acquire_with_timeout(&self, name: &str, timeout: Duration) -> Result<NamedLock> {
        debug!(lock_name = %name, "Waiting for lock");
        let (file, path) = self.open_lock_file(name).await?;

        let start = Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            if try_lock(&file).await? {
                debug!(lock_name = %name, wait_ms = start.elapsed().as_millis(), "Lock acquired");
                return Ok(NamedLock::new(name, path, file));
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(anyhow!("Timeout acquiring lock '{name}' after {timeout:?}"))
    }

    async fn open_lock_file(&self, name: &str) -> Result<(Arc<File>, PathBuf)> {
        tokio::fs::create_dir_all(&self.locks_dir).await.with_context(|| {
            format!("Failed to create locks directory: {}", self.locks_dir.display())
        })?;

        let path = self.locks_dir.join(format!("{name}.lock"));
        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        Ok((Arc::new(file), path))
    }
}

/// Returns `Ok(false)` when the lock is held elsewhere.
async fn try_lock(file: &Arc<File>) -> Result<bool> {
    let file = Arc::clone(file);
    let result = tokio::task::spawn_blocking(move || file.try_lock_exclusive())
        .await
        .context("spawn_blocking panicked")?;

    match result {
        Ok(acquired) => Ok(acquired),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e).context("Failed to lock file"),
    }
}

/// An exclusive lock held until dropped.
#[derive(Debug)]
pub struct NamedLock {
    name: String,
    path: PathBuf,
    file: Option<Arc<File>>,
}

impl NamedLock {
    fn new(name: &str, path: PathBuf, file: Arc<File>) -> Self {
        Self {
            name: name.to_string(),
            path,
            file: Some(file),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now, reporting unlock failures instead of logging them.
    pub fn release(mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => FileExt::unlock(file.as_ref())
                .with_context(|| format!("Failed to release lock '{}'", self.name)),
            None => Ok(()),
        }
    }
}

impl Drop for NamedLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(file.as_ref()) {
                debug!(lock_name = %self.name, error = %e, "Failed to release lock");
            } else {
                debug!(lock_name = %self.name, "Lock released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let locks = LockManager::new(temp.path());

        let lock = locks.try_acquire("gc").await.unwrap().unwrap();
        assert_eq!(lock.name(), "gc");
        assert!(temp.path().join(".locks/gc.lock").exists());
    }

    #[tokio::test]
    async fn test_non_blocking_contention_returns_none() {
        let temp = TempDir::new().unwrap();
        let locks = LockManager::new(temp.path());

        let held = locks.try_acquire("self-update").await.unwrap();
        assert!(held.is_some());

        let second = locks.try_acquire("self-update").await.unwrap();
        assert!(second.is_none());

        drop(held);
        assert!(locks.try_acquire("self-update").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_different_names_do_not_contend() {
        let temp = TempDir::new().unwrap();
        let locks = LockManager::new(temp.path());

        let _gc = locks.try_acquire("gc").await.unwrap().unwrap();
        assert!(locks.try_acquire("self-update").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_explicit_release() {
        let temp = TempDir::new().unwrap();
        let locks = LockManager::new(temp.path());

        let lock = locks.try_acquire("gc").await.unwrap().unwrap();
        lock.release().unwrap();
        assert!(locks.try_acquire("gc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out() {
        let temp = TempDir::new().unwrap();
        let locks = LockManager::new(temp.path());

        let _held = locks.try_acquire("gc").await.unwrap().unwrap();
        let start = Instant::now();
        let result = locks.acquire_with_timeout("gc", Duration::from_millis(100)).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Timeout acquiring lock 'gc'"));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_bounded_wait_succeeds_after_release() {
        let temp = TempDir::new().unwrap();
        let locks = LockManager::new(temp.path());

        let held = locks.try_acquire("gc").await.unwrap().unwrap();
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire_with_timeout("gc", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
    }
}
