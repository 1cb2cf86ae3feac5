//! On-disk layout of the storage directory.
//!
//! ```text
//! ~/.multiwerf/
//! ├── 1.1.0/
//! │   ├── werf-linux-amd64-v1.1.0
//! │   └── SHA256SUMS
//! ├── 1.1.1-alpha.1/
//! ├── channel_mapping.json
//! ├── channel_mapping.json.old
//! ├── update.delay
//! ├── remote_channel_mapping.delay
//! ├── config.toml
//! └── .locks/
//! ```
//!
//! Version directories are created by downloads and destroyed only by garbage
//! collection. Everything else at the root is bookkeeping.

use crate::constants::{
    BACKUP_SUFFIX, CHANNEL_MAPPING_FILE, CHECKSUM_MANIFEST_FILE, REMOTE_MAPPING_DELAY_FILE,
    SELF_UPDATE_DELAY_FILE,
};
use crate::verification::{ChecksumManifest, verify_against_manifest};
use crate::version::ParsedVersion;
use anyhow::{Context, Result, bail};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Operating system component of release file names.
pub fn os_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Architecture component of release file names.
pub fn arch_name() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Release file name of `program` at `version` for the running platform.
///
/// A leading `v` on the version is not doubled.
///
/// ```rust
/// use multiwerf::storage::release_file_name;
///
/// let name = release_file_name("werf", "1.1.0");
/// assert!(name.starts_with("werf-"));
/// assert!(name.contains("-v1.1.0"));
/// ```
pub fn release_file_name(program: &str, version: &str) -> String {
    let version = version.strip_prefix('v').unwrap_or(version);
    let extension = if cfg!(windows) { ".exe" } else { "" };
    format!("{program}-{}-{}-v{version}{extension}", os_name(), arch_name())
}

/// Paths inside the storage directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    program: String,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            program: program.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.with_context(|| {
            format!("Failed to create storage directory: {}", self.root.display())
        })
    }

    pub fn channel_mapping_path(&self) -> PathBuf {
        self.root.join(CHANNEL_MAPPING_FILE)
    }

    pub fn channel_mapping_backup_path(&self) -> PathBuf {
        self.root.join(format!("{CHANNEL_MAPPING_FILE}{BACKUP_SUFFIX}"))
    }

    pub fn self_update_delay_path(&self) -> PathBuf {
        self.root.join(SELF_UPDATE_DELAY_FILE)
    }

    pub fn remote_mapping_delay_path(&self) -> PathBuf {
        self.root.join(REMOTE_MAPPING_DELAY_FILE)
    }

    /// Directory holding the files of `version`.
    ///
    /// # Errors
    ///
    /// `version` must be a single plain path component. Absolute paths,
    /// `..` and anything containing a separator are rejected, so the result
    /// always lies directly inside the storage directory.
    pub fn version_dir(&self, version: &str) -> Result<PathBuf> {
        let mut components = Path::new(version).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == version => Ok(self.root.join(version)),
            _ => bail!(
                "'{version}' cannot name a version directory in {}",
                self.root.display()
            ),
        }
    }

    pub fn program_file_name(&self, version: &str) -> String {
        release_file_name(&self.program, version)
    }

    pub fn binary_path(&self, version: &str) -> Result<PathBuf> {
        Ok(self.version_dir(version)?.join(self.program_file_name(version)))
    }

    pub fn manifest_path(&self, version: &str) -> Result<PathBuf> {
        Ok(self.version_dir(version)?.join(CHECKSUM_MANIFEST_FILE))
    }

    /// Whether the version's binary exists and matches its stored manifest.
    ///
    /// Any failure along the way (missing files, unreadable manifest, mismatch)
    /// counts as "not present", so the caller downloads again.
    pub async fn has_verified_binary(&self, version: &str) -> bool {
        let (Ok(binary), Ok(manifest_path)) = (self.binary_path(version), self.manifest_path(version)) else {
            return false;
        };
        let manifest = match tokio::fs::read_to_string(manifest_path).await {
            Ok(content) => content,
            Err(_) => return false,
        };
        let Ok(manifest) = ChecksumManifest::parse(&manifest) else {
            return false;
        };

        match verify_against_manifest(&binary, &self.program_file_name(version), &manifest).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Local copy of {version} is not usable: {e:#}");
                false
            }
        }
    }

    /// Names of the version directories, sorted by version precedence.
    ///
    /// Entries that are not directories or whose names do not parse as semantic
    /// versions (such as `.locks` or in-flight download directories) are skipped.
    /// A missing storage directory yields an empty list.
    pub async fn list_version_dirs(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read storage directory: {}", self.root.display())
                });
            }
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to read storage directory: {}", self.root.display()))?
        {
            let file_type = entry.file_type().await.with_context(|| {
                format!("Failed to inspect {}", entry.path().display())
            })?;
            if !file_type.is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(version) = ParsedVersion::parse(&name) {
                versions.push(version);
            }
        }

        versions.sort_by(|a, b| a.cmp_precedence(b).then_with(|| a.original().cmp(b.original())));
        Ok(versions.into_iter().map(|v| v.original().to_string()).collect())
    }
}
