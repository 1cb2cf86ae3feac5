//! The `update`, `use`, `bin-path` and `available-releases` commands.
//!
//! [`VersionManager`] ties the pieces together: it picks the version for a
//! (group, channel) request from a channel mapping or, failing that, from the
//! backends' release listings, makes sure that version is cached and verified,
//! and records the choice in the local channel mapping so the garbage collector
//! keeps it.
//!
//! Mapping writes and cache changes happen under the `gc` lock. Unlike the
//! garbage collector, which gives up when the lock is busy, this path waits for
//! it with a bounded timeout.

use crate::channel_mapping::{ChannelMapping, ChannelMappingError};
use crate::config::Config;
use crate::constants::{CACHE_LOCK_TIMEOUT, GC_LOCK, METADATA_TIMEOUT, PROGRAM_NAME};
use crate::core::MultiwerfError;
use crate::delay::UpdateDelay;
use crate::events::{EventSender, ProgressEvent};
use crate::lock::LockManager;
use crate::repository::{Repository, program_with_manifest};
use crate::storage::Storage;
use crate::verification::{ChecksumManifest, verify_against_manifest};
use crate::version::{ChannelOrder, Group, ParsedVersion, resolve};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const STAGE: &str = "update";

/// A validated (group, channel) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub group: String,
    pub channel: String,
}

impl Request {
    /// Validate user input against the channel order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::version::VersionError`] for a malformed group or an
    /// unknown channel.
    pub fn parse(group: &str, channel: &str, channels: &ChannelOrder) -> Result<Self> {
        Group::parse(group)?;
        channels.parse_channel(channel)?;
        Ok(Self {
            group: group.to_string(),
            channel: channel.to_string(),
        })
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.group, self.channel)
    }
}

/// Resolves, downloads and records program versions.
pub struct VersionManager {
    storage: Storage,
    channels: ChannelOrder,
    repositories: Vec<Arc<dyn Repository>>,
    mapping_url: String,
    remote_delay: UpdateDelay,
    locks: LockManager,
    client: reqwest::Client,
    lock_timeout: Duration,
}

impl VersionManager {
    /// Manager using the backends and locations of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.storage(),
            config.channels.clone(),
            config.program_backends()?,
            &config.channel_mapping_url,
            config.remote_mapping_delay,
        )
    }

    pub fn new(
        storage: Storage,
        channels: ChannelOrder,
        repositories: Vec<Arc<dyn Repository>>,
        mapping_url: &str,
        remote_delay: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("multiwerf/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(METADATA_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            remote_delay: UpdateDelay::new(storage.remote_mapping_delay_path(), remote_delay),
            locks: LockManager::new(storage.root()),
            storage,
            channels,
            repositories,
            mapping_url: mapping_url.to_string(),
            client,
            lock_timeout: CACHE_LOCK_TIMEOUT,
        })
    }

    /// How long to wait for the cache lock.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn channels(&self) -> &ChannelOrder {
        &self.channels
    }

    /// Make the version for `request` available locally and return its binary.
    ///
    /// With `try_remote` the remote channel mapping is fetched even if its
    /// check delay has not passed yet.
    ///
    /// # Errors
    ///
    /// - no backend publishes a version for the request
    ///   ([`MultiwerfError::VersionNotFound`])
    /// - every backend failed to deliver a verified binary
    ///   ([`MultiwerfError::DownloadFailed`])
    /// - the cache lock could not be taken in time, or the mapping could not
    ///   be written
    pub async fn update(&self, request: &Request, try_remote: bool, events: &EventSender) -> Result<PathBuf> {
        self.storage.ensure_root().await?;

        let mut mapping = self.channel_mapping(try_remote, events).await?;
        let version = match mapping.channel_version(&request.group, &request.channel) {
            Ok(version) => {
                debug!("Channel mapping has {version} for {request}");
                version
            }
            Err(e @ (ChannelMappingError::GroupNotFound { .. } | ChannelMappingError::ChannelNotFound { .. })) => {
                debug!("{e}, resolving from release listings");
                let version = self.resolve_from_backends(request, events).await?;
                mapping.set_channel_version(&request.group, &request.channel, &version);
                version
            }
            Err(e) => return Err(e.into()),
        };

        // Unlike gc and self-update, downloads wait out a running collection
        // (bounded by lock_timeout) instead of skipping.
        let lock = self
            .locks
            .acquire_with_timeout(GC_LOCK, self.lock_timeout)
            .await
            .context("Failed to lock the version cache")?;

        self.ensure_version(&version, events).await?;
        if mapping.save(&self.storage.channel_mapping_path()).await? {
            debug!("Saved channel mapping to {}", self.storage.channel_mapping_path().display());
        }

        lock.release()?;

        events
            .send(ProgressEvent::ok(STAGE, format!("{PROGRAM_NAME} {version} is ready for {request}")))
            .await?;
        self.storage.binary_path(&version)
    }

    /// The cached binary for `request`, without touching the network.
    ///
    /// # Errors
    ///
    /// Fails if there is no local channel mapping, it has no entry for the
    /// request, or the version is not downloaded.
    pub async fn bin_path(&self, request: &Request) -> Result<PathBuf> {
        let mapping = ChannelMapping::load_local(&self.storage.channel_mapping_path()).await?;
        let version = match mapping.channel_version(&request.group, &request.channel) {
            Ok(version) => version,
            Err(ChannelMappingError::GroupNotFound { .. } | ChannelMappingError::ChannelNotFound { .. }) => {
                return Err(MultiwerfError::VersionNotFound {
                    group: request.group.clone(),
                    channel: request.channel.clone(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        if !self.storage.has_verified_binary(&version).await {
            return Err(MultiwerfError::NotDownloaded {
                group: request.group.clone(),
                channel: request.channel.clone(),
                version,
            }
            .into());
        }
        self.storage.binary_path(&version)
    }

    /// Versions published by the first backend that answers, oldest first.
    ///
    /// With `group`, only versions of that MAJOR.MINOR line are returned.
    pub async fn available_releases(&self, group: Option<&str>, events: &EventSender) -> Result<Vec<String>> {
        let group = group.map(Group::parse).transpose()?;

        let mut last_error = None;
        for repository in &self.repositories {
            match repository.list_versions().await {
                Ok(versions) => {
                    let mut parsed: Vec<ParsedVersion> = versions
                        .iter()
                        .filter_map(|v| ParsedVersion::parse(v).ok())
                        .filter(|v| group.as_ref().is_none_or(|g| v.in_group(g)))
                        .collect();
                    parsed.sort_by(|a, b| a.cmp_precedence(b).then_with(|| a.original().cmp(b.original())));
                    return Ok(parsed.iter().map(|v| v.original().to_string()).collect());
                }
                Err(e) => {
                    events
                        .send(
                            ProgressEvent::warn("releases", format!("{} failed", repository.name()))
                                .with_comment(e.to_string()),
                        )
                        .await?;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(anyhow::Error::new(e).context("No backend could list releases")),
            None => Err(anyhow!("No release backends configured")),
        }
    }

    /// The mapping to resolve against.
    ///
    /// The remote document is tried when its check delay passed (or `force`);
    /// any failure falls back to the local copy, and a missing or unreadable
    /// local copy to an empty mapping.
    async fn channel_mapping(&self, force: bool, events: &EventSender) -> Result<ChannelMapping> {
        if force || self.remote_delay.is_passed().await {
            if let Err(e) = self.remote_delay.touch().await {
                warn!("Failed to restart the channel mapping delay: {e:#}");
            }

            match ChannelMapping::load_remote(&self.client, &self.mapping_url).await {
                Ok(mapping) => {
                    events
                        .send(ProgressEvent::debug(
                            STAGE,
                            format!("Fetched channel mapping from {}", self.mapping_url),
                        ))
                        .await?;
                    return Ok(mapping);
                }
                Err(e) => {
                    events
                        .send(
                            ProgressEvent::warn(STAGE, "Cannot fetch the channel mapping, using the local copy")
                                .with_comment(format!("{e:#}")),
                        )
                        .await?;
                }
            }
        }

        match ChannelMapping::load_local(&self.storage.channel_mapping_path()).await {
            Ok(mapping) => Ok(mapping),
            Err(ChannelMappingError::NotFound { .. }) => Ok(ChannelMapping::empty()),
            Err(e) => {
                events
                    .send(
                        ProgressEvent::warn(STAGE, "Local channel mapping is unusable, ignoring it")
                            .with_comment(e.to_string()),
                    )
                    .await?;
                Ok(ChannelMapping::empty())
            }
        }
    }

    async fn resolve_from_backends(&self, request: &Request, events: &EventSender) -> Result<String> {
        for repository in &self.repositories {
            let versions = match repository.list_versions().await {
                Ok(versions) => versions,
                Err(e) => {
                    events
                        .send(
                            ProgressEvent::warn(STAGE, format!("{} failed, trying next", repository.name()))
                                .with_comment(e.to_string()),
                        )
                        .await?;
                    continue;
                }
            };

            // Unparsable tags are dropped so one odd release cannot block resolution.
            let versions: Vec<String> = versions
                .into_iter()
                .filter(|v| ParsedVersion::parse(v).is_ok())
                .collect();
            if let Some(version) = resolve(&request.group, &request.channel, &versions, &self.channels)? {
                info!("Resolved {request} to {version} using {}", repository.name());
                return Ok(version);
            }
            debug!("{} has no version for {request}", repository.name());
        }

        Err(MultiwerfError::VersionNotFound {
            group: request.group.clone(),
            channel: request.channel.clone(),
        }
        .into())
    }

    /// Download and verify `version` unless a verified copy is cached.
    async fn ensure_version(&self, version: &str, events: &EventSender) -> Result<()> {
        if self.storage.has_verified_binary(version).await {
            events
                .send(ProgressEvent::debug(STAGE, format!("{PROGRAM_NAME} {version} is already downloaded")))
                .await?;
            return Ok(());
        }

        let file_name = self.storage.program_file_name(version);
        let files = program_with_manifest(&file_name);
        let dest = self.storage.version_dir(version)?;

        let mut last_error = None;
        for repository in &self.repositories {
            events
                .send(ProgressEvent::started(
                    STAGE,
                    format!("Downloading {PROGRAM_NAME} {version} from {}", repository.name()),
                ))
                .await?;

            let attempt = async {
                repository.download(version, &dest, &files).await?;
                self.verify_download(version, &dest).await
            }
            .await;

            match attempt {
                Ok(()) => return Ok(()),
                Err(e) => {
                    remove_quietly(&dest).await;
                    events
                        .send(
                            ProgressEvent::warn(STAGE, format!("{} failed", repository.name()))
                                .with_comment(format!("{e:#}")),
                        )
                        .await?;
                    last_error = Some(e);
                }
            }
        }

        let failure = anyhow::Error::new(MultiwerfError::DownloadFailed {
            version: version.to_string(),
        });
        Err(match last_error {
            Some(e) => failure.context(format!("{e:#}")),
            None => failure.context("No release backends configured"),
        })
    }

    async fn verify_download(&self, version: &str, dir: &Path) -> Result<()> {
        let manifest_path = self.storage.manifest_path(version)?;
        let content = tokio::fs::read_to_string(&manifest_path)
            .await
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let manifest = ChecksumManifest::parse(&content)?;

        let file_name = self.storage.program_file_name(version);
        let binary = dir.join(&file_name);
        verify_against_manifest(&binary, &file_name, &manifest).await?;
        crate::utils::fs::set_executable(&binary)
    }
}

async fn remove_quietly(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {e}", dir.display());
        }
    }
}

/// POSIX shell snippet that points the `werf` alias at `binary`.
pub fn use_script(request: &Request, binary: &Path) -> String {
    let quoted = binary.to_string_lossy().replace('\'', r"'\''");
    format!("# {PROGRAM_NAME} {request}\nalias {PROGRAM_NAME}='{quoted}'\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;
    use crate::repository::LocalRepository;
    use crate::storage::release_file_name;
    use crate::verification::compute_sha256;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Fixture {
        temp: TempDir,
        storage: Storage,
        mirror: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            crate::logging::init_test_logging(None);
            let temp = TempDir::new().unwrap();
            let storage = Storage::new(temp.path().join("storage"), PROGRAM_NAME);
            let mirror = temp.path().join("mirror");
            std::fs::create_dir_all(&mirror).unwrap();
            Self { temp, storage, mirror }
        }

        /// Publish `version` in the mirror with a matching manifest.
        async fn publish(&self, version: &str) {
            let dir = self.mirror.join(version);
            std::fs::create_dir_all(&dir).unwrap();
            let file_name = release_file_name(PROGRAM_NAME, version);
            let binary = dir.join(&file_name);
            std::fs::write(&binary, format!("werf {version}")).unwrap();
            let digest = compute_sha256(&binary).await.unwrap();
            std::fs::write(dir.join("SHA256SUMS"), format!("{digest}  {file_name}\n")).unwrap();
        }

        fn mapping_url(&self, versions: &[(&str, &str, &str)]) -> String {
            let mut mapping = ChannelMapping::empty();
            for (group, channel, version) in versions {
                mapping.set_channel_version(group, channel, version);
            }
            let path = self.temp.path().join("remote_mapping.json");
            std::fs::write(&path, mapping.to_canonical_json().unwrap()).unwrap();
            format!("file://{}", path.display())
        }

        fn manager(&self, mapping_url: &str) -> VersionManager {
            self.manager_with(vec![Arc::new(LocalRepository::new(&self.mirror))], mapping_url)
        }

        fn manager_with(&self, repositories: Vec<Arc<dyn Repository>>, mapping_url: &str) -> VersionManager {
            VersionManager::new(
                self.storage.clone(),
                ChannelOrder::default(),
                repositories,
                mapping_url,
                Duration::from_secs(1800),
            )
            .unwrap()
            .lock_timeout(Duration::from_millis(200))
        }
    }

    fn request(group: &str, channel: &str) -> Request {
        Request::parse(group, channel, &ChannelOrder::default()).unwrap()
    }

    /// Collects every event sent while the returned sender is alive.
    fn collector() -> (EventSender, tokio::task::JoinHandle<Vec<ProgressEvent>>) {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                seen.push(event);
            }
            seen
        });
        (EventSender::new(tx), handle)
    }

    #[test]
    fn test_request_validation() {
        let channels = ChannelOrder::default();
        assert!(Request::parse("1.1", "stable", &channels).is_ok());
        assert!(Request::parse("1", "stable", &channels).is_err());
        assert!(Request::parse("1.1", "nightly", &channels).is_err());
    }

    #[tokio::test]
    async fn test_update_uses_remote_mapping() {
        let fx = Fixture::new();
        fx.publish("1.1.3").await;
        fx.publish("1.1.4").await;
        let manager = fx.manager(&fx.mapping_url(&[("1.1", "stable", "1.1.3")]));

        let (events, handle) = collector();
        let path = manager.update(&request("1.1", "stable"), false, &events).await.unwrap();
        drop(events);
        handle.await.unwrap();

        assert_eq!(path, fx.storage.binary_path("1.1.3").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "werf 1.1.3");

        let saved = ChannelMapping::load_local(&fx.storage.channel_mapping_path()).await.unwrap();
        assert_eq!(saved.channel_version("1.1", "stable").unwrap(), "1.1.3");
    }

    #[tokio::test]
    async fn test_update_falls_back_to_release_listing() {
        let fx = Fixture::new();
        for version in ["1.1.0-alpha.1", "1.1.0", "1.1.1-alpha.1"] {
            fx.publish(version).await;
        }
        let manager = fx.manager(&fx.mapping_url(&[]));

        let (events, handle) = collector();
        let path = manager.update(&request("1.1", "alpha"), false, &events).await.unwrap();
        drop(events);
        handle.await.unwrap();

        assert_eq!(path, fx.storage.binary_path("1.1.1-alpha.1").unwrap());
        let saved = ChannelMapping::load_local(&fx.storage.channel_mapping_path()).await.unwrap();
        assert_eq!(saved.channel_version("1.1", "alpha").unwrap(), "1.1.1-alpha.1");
    }

    #[tokio::test]
    async fn test_unreachable_remote_falls_back_with_warning() {
        let fx = Fixture::new();
        fx.publish("1.2.0").await;
        let missing = format!("file://{}", fx.temp.path().join("absent.json").display());
        let manager = fx.manager(&missing);

        let (events, handle) = collector();
        let path = manager.update(&request("1.2", "stable"), false, &events).await.unwrap();
        drop(events);
        let seen = handle.await.unwrap();

        assert_eq!(path, fx.storage.binary_path("1.2.0").unwrap());
        assert!(seen.iter().any(|e| e.severity == Severity::Warn));
    }

    #[tokio::test]
    async fn test_remote_mapping_respects_delay() {
        let fx = Fixture::new();
        fx.publish("1.1.3").await;
        fx.publish("1.1.4").await;
        let manager = fx.manager(&fx.mapping_url(&[("1.1", "stable", "1.1.3")]));

        let (events, handle) = collector();
        manager.update(&request("1.1", "stable"), false, &events).await.unwrap();

        // The remote now points elsewhere, but the delay keeps the local copy in use.
        fx.mapping_url(&[("1.1", "stable", "1.1.4")]);
        let path = manager.update(&request("1.1", "stable"), false, &events).await.unwrap();
        assert_eq!(path, fx.storage.binary_path("1.1.3").unwrap());

        let path = manager.update(&request("1.1", "stable"), true, &events).await.unwrap();
        assert_eq!(path, fx.storage.binary_path("1.1.4").unwrap());
        drop(events);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_version_is_not_found() {
        let fx = Fixture::new();
        fx.publish("1.1.0").await;
        let manager = fx.manager(&fx.mapping_url(&[]));

        let (events, handle) = collector();
        let error = manager.update(&request("1.3", "stable"), false, &events).await.unwrap_err();
        drop(events);
        handle.await.unwrap();

        assert!(matches!(
            error.downcast_ref::<MultiwerfError>(),
            Some(MultiwerfError::VersionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_tries_next_backend() {
        let fx = Fixture::new();
        fx.publish("1.1.0").await;

        let broken = fx.temp.path().join("broken");
        let dir = broken.join("1.1.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(release_file_name(PROGRAM_NAME, "1.1.0")), "tampered").unwrap();
        std::fs::copy(fx.mirror.join("1.1.0").join("SHA256SUMS"), dir.join("SHA256SUMS")).unwrap();

        let manager = fx.manager_with(
            vec![Arc::new(LocalRepository::new(&broken)), Arc::new(LocalRepository::new(&fx.mirror))],
            &fx.mapping_url(&[("1.1", "stable", "1.1.0")]),
        );

        let (events, handle) = collector();
        let path = manager.update(&request("1.1", "stable"), false, &events).await.unwrap();
        drop(events);
        let seen = handle.await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "werf 1.1.0");
        assert_eq!(seen.iter().filter(|e| e.severity == Severity::Warn).count(), 1);
    }

    #[tokio::test]
    async fn test_every_backend_failing_is_download_failure() {
        let fx = Fixture::new();
        let manager = fx.manager(&fx.mapping_url(&[("1.1", "stable", "1.1.0")]));

        let (events, handle) = collector();
        let error = manager.update(&request("1.1", "stable"), false, &events).await.unwrap_err();
        drop(events);
        handle.await.unwrap();

        assert!(matches!(
            error.downcast_ref::<MultiwerfError>(),
            Some(MultiwerfError::DownloadFailed { .. })
        ));
        assert!(!fx.storage.version_dir("1.1.0").unwrap().exists());
    }

    #[tokio::test]
    async fn test_update_waits_for_cache_lock() {
        let fx = Fixture::new();
        fx.publish("1.1.0").await;
        let manager = fx.manager(&fx.mapping_url(&[("1.1", "stable", "1.1.0")]));
        let _held = LockManager::new(fx.storage.root()).try_acquire(GC_LOCK).await.unwrap().unwrap();

        let (events, handle) = collector();
        let error = manager.update(&request("1.1", "stable"), false, &events).await.unwrap_err();
        drop(events);
        handle.await.unwrap();

        assert!(error.to_string().contains("lock"));
    }

    #[tokio::test]
    async fn test_mapping_entries_outside_storage_are_rejected() {
        let fx = Fixture::new();
        let victim = fx.temp.path().join("victim");
        std::fs::create_dir_all(&victim).unwrap();
        std::fs::write(victim.join("precious.txt"), "keep me").unwrap();

        let absolute = victim.display().to_string();
        for version in [absolute.as_str(), "../victim", "1.1.0/../../victim"] {
            let manager = fx.manager(&fx.mapping_url(&[("1.1", "stable", version)]));

            let (events, handle) = collector();
            let error = manager.update(&request("1.1", "stable"), true, &events).await.unwrap_err();
            drop(events);
            let seen = handle.await.unwrap();

            assert!(
                matches!(
                    error.downcast_ref::<ChannelMappingError>(),
                    Some(ChannelMappingError::InvalidVersion { .. })
                ),
                "{version}: {error:#}"
            );
            assert!(seen.iter().all(|e| !e.text.starts_with("Downloading")));
            assert_eq!(std::fs::read_to_string(victim.join("precious.txt")).unwrap(), "keep me");
        }

        let mut local = ChannelMapping::empty();
        local.set_channel_version("1.1", "stable", &absolute);
        std::fs::write(fx.storage.channel_mapping_path(), local.to_canonical_json().unwrap()).unwrap();
        let manager = fx.manager("file:///unused.json");
        assert!(manager.bin_path(&request("1.1", "stable")).await.is_err());
        assert!(victim.join("precious.txt").exists());
    }

    #[tokio::test]
    async fn test_bin_path_after_update() {
        let fx = Fixture::new();
        fx.publish("1.1.0").await;
        let manager = fx.manager(&fx.mapping_url(&[("1.1", "stable", "1.1.0")]));

        assert!(manager.bin_path(&request("1.1", "stable")).await.is_err());

        let (events, handle) = collector();
        manager.update(&request("1.1", "stable"), false, &events).await.unwrap();
        drop(events);
        handle.await.unwrap();

        assert_eq!(
            manager.bin_path(&request("1.1", "stable")).await.unwrap(),
            fx.storage.binary_path("1.1.0").unwrap()
        );
        let error = manager.bin_path(&request("1.1", "alpha")).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MultiwerfError>(),
            Some(MultiwerfError::VersionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_bin_path_reports_missing_download() {
        let fx = Fixture::new();
        let manager = fx.manager("file:///unused.json");
        let mut mapping = ChannelMapping::empty();
        mapping.set_channel_version("1.1", "stable", "1.1.0");
        std::fs::create_dir_all(fx.storage.root()).unwrap();
        std::fs::write(fx.storage.channel_mapping_path(), mapping.to_canonical_json().unwrap()).unwrap();

        let error = manager.bin_path(&request("1.1", "stable")).await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MultiwerfError>(),
            Some(MultiwerfError::NotDownloaded { .. })
        ));
    }

    #[tokio::test]
    async fn test_available_releases_sorted_and_filtered() {
        let fx = Fixture::new();
        for version in ["1.2.0", "1.1.10", "1.1.2", "1.1.2-rc.1"] {
            fx.publish(version).await;
        }
        let manager = fx.manager("file:///unused.json");

        let (events, handle) = collector();
        let all = manager.available_releases(None, &events).await.unwrap();
        let group = manager.available_releases(Some("1.1"), &events).await.unwrap();
        drop(events);
        handle.await.unwrap();

        assert_eq!(all, vec!["1.1.2-rc.1", "1.1.2", "1.1.10", "1.2.0"]);
        assert_eq!(group, vec!["1.1.2-rc.1", "1.1.2", "1.1.10"]);
    }

    #[test]
    fn test_use_script_quotes_path() {
        let script = use_script(&request("1.1", "stable"), Path::new("/home/o'neil/.multiwerf/werf"));
        assert_eq!(script, "# werf 1.1 stable\nalias werf='/home/o'\\''neil/.multiwerf/werf'\n");
    }
}
