//! File-timestamp throttle for periodic network checks.
//!
//! An [`UpdateDelay`] is nothing more than a marker file and an interval. The
//! marker's modification time records the last check; the delay has passed once
//! that time plus the interval lies in the past. A missing marker means the
//! check has never run, so the delay counts as passed.
//!
//! Self-update uses a delay of a few hours; the remote channel mapping check uses
//! a shorter one.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct UpdateDelay {
    path: PathBuf,
    interval: Duration,
}

impl UpdateDelay {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the interval has elapsed since the marker was last touched.
    pub async fn is_passed(&self) -> bool {
        self.time_remaining().await.is_none()
    }

    /// Time left until the delay passes, or `None` if it already has.
    ///
    /// An unreadable marker is treated like a missing one.
    pub async fn time_remaining(&self) -> Option<Duration> {
        let modified = match fs::metadata(&self.path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("Ignoring unreadable delay marker {}: {}", self.path.display(), e);
                }
                return None;
            }
        };

        // A marker stamped in the future counts as stamped now.
        let elapsed = SystemTime::now().duration_since(modified).unwrap_or_default();
        let remaining = self.interval.saturating_sub(elapsed);
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Local wall-clock time at which the delay will have passed.
    pub async fn next_check_at(&self) -> Option<DateTime<Local>> {
        let remaining = self.time_remaining().await?;
        let remaining = chrono::Duration::from_std(remaining).ok()?;
        Some(Local::now() + remaining)
    }

    /// Restart the delay by deleting and recreating the marker.
    ///
    /// Failing to recreate the marker is an error: the throttle is only as good
    /// as the marker's timestamp.
    pub async fn touch(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to remove delay marker {}", self.path.display())
                });
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create directory for delay marker: {}", parent.display())
            })?;
        }

        fs::write(&self.path, b"")
            .await
            .with_context(|| format!("Failed to create delay marker {}", self.path.display()))?;

        debug!("Touched delay marker {}", self.path.display());
        Ok(())
    }
}

/// Render a duration as `1h 5m 3s`, dropping leading zero units.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_marker_has_passed() {
        let temp = TempDir::new().unwrap();
        let delay = UpdateDelay::new(temp.path().join("update.delay"), Duration::from_secs(3600));

        assert!(delay.is_passed().await);
        assert!(delay.time_remaining().await.is_none());
        assert!(delay.next_check_at().await.is_none());
    }

    #[tokio::test]
    async fn test_touch_resets_delay() {
        let temp = TempDir::new().unwrap();
        let delay = UpdateDelay::new(temp.path().join("nested/update.delay"), Duration::from_secs(3600));

        delay.touch().await.unwrap();

        assert!(delay.path().exists());
        assert!(!delay.is_passed().await);
        let remaining = delay.time_remaining().await.unwrap();
        assert!(remaining <= Duration::from_secs(3600));
        assert!(remaining > Duration::from_secs(3500));
    }

    #[tokio::test]
    async fn test_touch_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let delay = UpdateDelay::new(temp.path().join("update.delay"), Duration::from_secs(60));

        delay.touch().await.unwrap();
        delay.touch().await.unwrap();
        assert!(!delay.is_passed().await);
    }

    #[tokio::test]
    async fn test_zero_interval_always_passed() {
        let temp = TempDir::new().unwrap();
        let delay = UpdateDelay::new(temp.path().join("update.delay"), Duration::ZERO);

        delay.touch().await.unwrap();
        assert!(delay.is_passed().await);
    }

    #[tokio::test]
    async fn test_touch_fails_when_marker_cannot_be_created() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let delay = UpdateDelay::new(blocker.join("update.delay"), Duration::from_secs(60));
        assert!(delay.touch().await.is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
