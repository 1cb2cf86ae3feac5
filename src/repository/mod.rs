//! Release repositories: where versions are listed and binaries are fetched.
//!
//! A [`Repository`] is a capability with three operations: list the published
//! versions, download a set of files for one version into a directory, and fetch
//! a small text file (the checksum manifest) of one version. Callers hold an
//! ordered `Vec<Arc<dyn Repository>>` and fall back from one backend to the next
//! when an operation fails.
//!
//! # Backends
//!
//! - [`github::GitHubRepository`] - GitHub Releases over HTTPS
//! - [`local::LocalRepository`] - a mirror directory laid out as `<version>/<file>`
//!
//! # Atomic downloads
//!
//! Downloads land in a hidden staging directory next to the destination and are
//! renamed into place only when every file arrived. A failed or interrupted
//! download never leaves a half-populated version directory behind.

pub mod github;
pub mod local;

pub use github::GitHubRepository;
pub use local::LocalRepository;

use crate::constants::{CHECKSUM_MANIFEST_FILE, MANIFEST_FILE_KEY, PROGRAM_FILE_KEY};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Files requested from a repository: logical name to release file name.
pub type DownloadFiles = BTreeMap<String, String>;

/// Request a program binary together with its checksum manifest.
pub fn program_with_manifest(program_file: &str) -> DownloadFiles {
    DownloadFiles::from([
        (PROGRAM_FILE_KEY.to_string(), program_file.to_string()),
        (MANIFEST_FILE_KEY.to_string(), CHECKSUM_MANIFEST_FILE.to_string()),
    ])
}

/// Request a single program binary.
pub fn program_only(program_file: &str) -> DownloadFiles {
    DownloadFiles::from([(PROGRAM_FILE_KEY.to_string(), program_file.to_string())])
}

/// Errors reported by repository backends.
///
/// All of them are considered transient from the caller's point of view: the
/// next backend is tried.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Version {version} has no file '{file}'")]
    FileNotFound { version: String, file: String },

    #[error("Unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RepositoryError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A source of published releases.
///
/// Futures are boxed so backends can be held as trait objects.
pub trait Repository: Send + Sync {
    /// Short human-readable name used in warnings.
    fn name(&self) -> &str;

    /// Every published version, in no particular order.
    fn list_versions(&self) -> BoxFuture<'_, Result<Vec<String>, RepositoryError>>;

    /// Download `files` of `version` into `dest_dir`.
    ///
    /// Files keep their release names. `dest_dir` is replaced atomically; it
    /// either ends up holding every requested file or is left untouched.
    fn download<'a>(
        &'a self,
        version: &'a str,
        dest_dir: &'a Path,
        files: &'a DownloadFiles,
    ) -> BoxFuture<'a, Result<(), RepositoryError>>;

    /// Fetch the text content of one release file.
    fn fetch_file_content<'a>(
        &'a self,
        version: &'a str,
        file_name: &'a str,
    ) -> BoxFuture<'a, Result<String, RepositoryError>>;
}

/// Populate a staging directory with `fill` and rename it to `dest_dir`.
pub(crate) async fn install_atomically<F, Fut>(dest_dir: &Path, fill: F) -> Result<(), RepositoryError>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<(), RepositoryError>>,
{
    let parent = dest_dir.parent().ok_or_else(|| {
        RepositoryError::io(
            format!("Download destination has no parent: {}", dest_dir.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    tokio::fs::create_dir_all(parent).await.map_err(|e| {
        RepositoryError::io(format!("Failed to create directory: {}", parent.display()), e)
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".download-")
        .tempdir_in(parent)
        .map_err(|e| {
            RepositoryError::io(
                format!("Failed to create staging directory in {}", parent.display()),
                e,
            )
        })?;

    fill(staging.path().to_path_buf()).await?;

    match tokio::fs::remove_dir_all(dest_dir).await {
        Ok(()) => debug!("Replaced existing directory {}", dest_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(RepositoryError::io(
                format!("Failed to remove stale directory: {}", dest_dir.display()),
                e,
            ));
        }
    }

    tokio::fs::rename(staging.path(), dest_dir).await.map_err(|e| {
        RepositoryError::io(
            format!("Failed to move download into place: {}", dest_dir.display()),
            e,
        )
    })?;

    // The staging directory is gone after the rename; its drop is a no-op.
    drop(staging);
    Ok(())
}
