//! Download progress bars.
//!
//! Bars are drawn on stderr next to the event renderer's output. They are hidden
//! when progress is disabled globally (the `--no-progress` flag or the
//! `MULTIWERF_NO_PROGRESS` environment variable) or when stderr is not a
//! terminal, so scripts capturing output never see control sequences.
//!
//! # Examples
//!
//! ```rust
//! use multiwerf::utils::progress::DownloadProgress;
//!
//! let progress = DownloadProgress::new("werf-linux-amd64-v1.1.0", Some(1024));
//! progress.inc(512);
//! progress.inc(512);
//! progress.finish_and_clear();
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static PROGRESS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable every progress bar created from now on.
pub fn disable_progress() {
    PROGRESS_DISABLED.store(true, Ordering::Relaxed);
}

fn is_progress_disabled() -> bool {
    PROGRESS_DISABLED.load(Ordering::Relaxed)
        || std::env::var_os("MULTIWERF_NO_PROGRESS").is_some()
        || !std::io::stderr().is_terminal()
}

/// Byte progress of a single file download.
///
/// With an unknown length the bar degrades to a spinner showing the byte count.
pub struct DownloadProgress {
    inner: IndicatifBar,
}

impl DownloadProgress {
    pub fn new(file_name: &str, total_bytes: Option<u64>) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else if let Some(total) = total_bytes {
            let bar = IndicatifBar::new(total);
            bar.set_style(download_style());
            bar
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_prefix(file_name.to_string());
        Self { inner: bar }
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

impl Drop for DownloadProgress {
    fn drop(&mut self) {
        if !self.inner.is_finished() {
            self.inner.finish_and_clear();
        }
    }
}

fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .map(|style| style.progress_chars("━╸━"))
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {bytes}")
        .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts_bytes() {
        let progress = DownloadProgress::new("werf", Some(100));
        progress.inc(40);
        progress.inc(60);
        assert_eq!(progress.position(), 100);
        progress.finish_and_clear();
    }

    #[test]
    fn test_unknown_length() {
        let progress = DownloadProgress::new("werf", None);
        progress.inc(10);
        assert_eq!(progress.position(), 10);
    }

    #[test]
    fn test_styles_build() {
        let _ = download_style();
        let _ = spinner_style();
    }
}
