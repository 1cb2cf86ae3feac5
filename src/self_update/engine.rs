use super::replace::{ReplaceError, check_writable, install_binary};
use crate::constants::{CHECKSUM_MANIFEST_FILE, SELF_NAME, SELF_UPDATE_LOCK};
use crate::delay::{UpdateDelay, format_duration};
use crate::events::{EventSender, ProgressEvent};
use crate::lock::LockManager;
use crate::repository::{Repository, program_only};
use crate::storage::{Storage, release_file_name};
use crate::verification::{ChecksumManifest, verify_against_manifest};
use crate::version::{ParsedVersion, highest_version};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const STAGE: &str = "self-update";

/// How a self-update run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfUpdateOutcome {
    /// The run stopped early: locked, throttled, not writable or every backend failed.
    Skipped,
    /// The newest release is already running.
    UpToDate,
    /// The executable at `path` now is `version`.
    Updated { path: PathBuf, version: String },
}

/// Result of trying one backend.
enum Attempt {
    UpToDate,
    Updated(String),
}

/// Updates this tool's own executable from a list of backends.
///
/// A run goes through these steps, stopping quietly (with a warning) at the
/// first one that does not pass:
///
/// 1. take the `self-update` lock without waiting;
/// 2. check and restart the update delay, unless experimental or forced;
/// 3. make sure the executable may be replaced by the current user;
/// 4. ask each backend in turn for its newest release, download it next to the
///    executable, verify it against the backend's manifest and swap it in.
///
/// Only a failed swap is an error, because it may leave the installation in
/// need of repair.
///
/// # Examples
///
/// ```rust,no_run
/// use multiwerf::self_update::{SelfUpdater, SelfUpdateOutcome};
/// use multiwerf::repository::{GitHubRepository, Repository};
/// use multiwerf::storage::Storage;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(events: multiwerf::events::EventSender) -> anyhow::Result<()> {
/// let storage = Storage::new("/home/user/.multiwerf", "werf");
/// let backends: Vec<Arc<dyn Repository>> =
///     vec![Arc::new(GitHubRepository::new("werf/multiwerf")?)];
///
/// let updater = SelfUpdater::new(backends, &storage, Duration::from_secs(7200)).force(true);
/// if let SelfUpdateOutcome::Updated { version, .. } = updater.run(&events).await? {
///     println!("now running {version}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct SelfUpdater {
    repositories: Vec<Arc<dyn Repository>>,
    locks: LockManager,
    delay: UpdateDelay,
    current_version: String,
    exe_path: Option<PathBuf>,
    experimental: bool,
    force: bool,
}

impl SelfUpdater {
    pub fn new(
        repositories: Vec<Arc<dyn Repository>>,
        storage: &Storage,
        delay_interval: std::time::Duration,
    ) -> Self {
        Self {
            repositories,
            locks: LockManager::new(storage.root()),
            delay: UpdateDelay::new(storage.self_update_delay_path(), delay_interval),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            exe_path: None,
            experimental: false,
            force: false,
        }
    }

    /// Skip the delay and consider prereleases.
    pub fn experimental(mut self, experimental: bool) -> Self {
        self.experimental = experimental;
        self
    }

    /// Ignore the delay (it is still restarted).
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    /// Executable to replace instead of the running one.
    pub fn exe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exe_path = Some(path.into());
        self
    }

    pub async fn run(&self, events: &EventSender) -> Result<SelfUpdateOutcome> {
        let _lock = match self.locks.try_acquire(SELF_UPDATE_LOCK).await {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                events
                    .send(ProgressEvent::warn(STAGE, "Another self-update is in progress, skipping"))
                    .await?;
                return Ok(SelfUpdateOutcome::Skipped);
            }
            Err(e) => {
                events
                    .send(
                        ProgressEvent::warn(STAGE, "Cannot take the self-update lock, skipping")
                            .with_comment(format!("{e:#}")),
                    )
                    .await?;
                return Ok(SelfUpdateOutcome::Skipped);
            }
        };

        if !self.experimental {
            if !self.force {
                if let Some(remaining) = self.delay.time_remaining().await {
                    let mut event = ProgressEvent::debug(
                        STAGE,
                        format!("Next check in {}", format_duration(remaining)),
                    );
                    if let Some(at) = self.delay.next_check_at().await {
                        event = event.with_comment(format!("at {}", at.format("%Y-%m-%d %H:%M:%S")));
                    }
                    events.send(event).await?;
                    return Ok(SelfUpdateOutcome::Skipped);
                }
            }
            // Stamped before any network traffic, even if every backend then fails.
            self.delay.touch().await.context("Failed to restart the self-update delay")?;
        }

        let exe_path = match self.resolve_exe_path() {
            Ok(path) => path,
            Err(e) => {
                events
                    .send(
                        ProgressEvent::warn(STAGE, "Cannot locate the running executable, skipping")
                            .with_comment(format!("{e:#}")),
                    )
                    .await?;
                return Ok(SelfUpdateOutcome::Skipped);
            }
        };
        if let Err(e) = check_writable(&exe_path) {
            events
                .send(
                    ProgressEvent::warn(STAGE, "Executable is not writable, skipping")
                        .with_comment(format!("{e:#}")),
                )
                .await?;
            return Ok(SelfUpdateOutcome::Skipped);
        }

        if self.repositories.is_empty() {
            events.send(ProgressEvent::warn(STAGE, "No update backends configured")).await?;
            return Ok(SelfUpdateOutcome::Skipped);
        }

        let last = self.repositories.len() - 1;
        for (index, repository) in self.repositories.iter().enumerate() {
            let is_last = index == last;
            match self.try_repository(repository.as_ref(), &exe_path, events).await {
                Ok(Attempt::UpToDate) => {
                    events
                        .send(ProgressEvent::ok(
                            STAGE,
                            format!("{SELF_NAME} {} is up to date", self.current_version),
                        ))
                        .await?;
                    return Ok(SelfUpdateOutcome::UpToDate);
                }
                Ok(Attempt::Updated(version)) => {
                    info!("Updated {SELF_NAME} from {} to {version}", self.current_version);
                    events
                        .send(ProgressEvent::ok(
                            STAGE,
                            format!("Updated {SELF_NAME} {} -> {version}", self.current_version),
                        ))
                        .await?;
                    return Ok(SelfUpdateOutcome::Updated {
                        path: exe_path,
                        version,
                    });
                }
                Err(e) if e.downcast_ref::<ReplaceError>().is_some() => return Err(e),
                Err(e) if !is_last => {
                    events
                        .send(
                            ProgressEvent::warn(STAGE, format!("{} failed, trying next", repository.name()))
                                .with_comment(format!("{e:#}")),
                        )
                        .await?;
                }
                Err(e) => {
                    events
                        .send(
                            ProgressEvent::fail(STAGE, format!("Self-update from {} failed", repository.name()))
                                .with_comment(format!("{e:#}")),
                        )
                        .await?;
                }
            }
        }

        Ok(SelfUpdateOutcome::Skipped)
    }

    fn resolve_exe_path(&self) -> Result<PathBuf> {
        match &self.exe_path {
            Some(path) => Ok(path.clone()),
            None => {
                let exe = std::env::current_exe().context("Failed to locate current executable")?;
                // Follow symlinks so the real file is replaced, not the link.
                std::fs::canonicalize(&exe)
                    .with_context(|| format!("Failed to resolve {}", exe.display()))
            }
        }
    }

    async fn latest_version(&self, repository: &dyn Repository) -> Result<String> {
        let versions = repository.list_versions().await?;
        if versions.is_empty() {
            return Err(anyhow!("no releases found"));
        }

        let candidates: Vec<String> = versions
            .into_iter()
            .filter(|v| match ParsedVersion::parse(v) {
                Ok(parsed) => self.experimental || parsed.is_stable(),
                Err(_) => false,
            })
            .collect();

        highest_version(&candidates)?.ok_or_else(|| anyhow!("no suitable release found"))
    }

    async fn try_repository(
        &self,
        repository: &dyn Repository,
        exe_path: &Path,
        events: &EventSender,
    ) -> Result<Attempt> {
        let latest = self.latest_version(repository).await?;
        debug!("{} offers {SELF_NAME} {latest}", repository.name());

        let current = ParsedVersion::parse(&self.current_version)?;
        let candidate = ParsedVersion::parse(&latest)?;
        if candidate.cmp_precedence(&current).is_le() {
            return Ok(Attempt::UpToDate);
        }

        events
            .send(ProgressEvent::started(
                STAGE,
                format!("Downloading {SELF_NAME} {latest} from {}", repository.name()),
            ))
            .await?;

        let exe_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow!("{} has no parent directory", exe_path.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(".multiwerf-update-")
            .tempdir_in(exe_dir)
            .with_context(|| format!("Failed to create staging directory in {}", exe_dir.display()))?;

        let file_name = release_file_name(SELF_NAME, &latest);
        let download_dir = staging.path().join("download");
        repository.download(&latest, &download_dir, &program_only(&file_name)).await?;

        let manifest = repository.fetch_file_content(&latest, CHECKSUM_MANIFEST_FILE).await?;
        let manifest = ChecksumManifest::parse(&manifest)?;
        let downloaded = download_dir.join(&file_name);
        verify_against_manifest(&downloaded, &file_name, &manifest).await?;

        install_binary(exe_path, &downloaded)?;

        Ok(Attempt::Updated(latest))
    }
}
