//! Mirror directory backend.
//!
//! The mirror holds one directory per version containing the release files:
//!
//! ```text
//! /srv/werf-mirror/
//! ├── 1.1.0/
//! │   ├── werf-linux-amd64-v1.1.0
//! │   └── SHA256SUMS
//! └── 1.1.1-alpha.1/
//! ```
//!
//! Useful for air-gapped installations and for tests.

use super::{DownloadFiles, Repository, RepositoryError, install_atomically};
use crate::version::ParsedVersion;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalRepository {
    name: String,
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: format!("mirror {}", root.display()),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, version: &str, file_name: &str) -> PathBuf {
        self.root.join(version).join(file_name)
    }

    async fn read_versions(&self) -> Result<Vec<String>, RepositoryError> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            RepositoryError::io(format!("Failed to read mirror: {}", self.root.display()), e)
        })?;

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            RepositoryError::io(format!("Failed to read mirror: {}", self.root.display()), e)
        })? {
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if is_dir && ParsedVersion::parse(name).is_ok() {
                versions.push(name.to_string());
            }
        }

        debug!("Mirror {} lists {} versions", self.root.display(), versions.len());
        Ok(versions)
    }

    async fn copy_files(
        &self,
        version: &str,
        dest_dir: &Path,
        files: &DownloadFiles,
    ) -> Result<(), RepositoryError> {
        install_atomically(dest_dir, |staging| async move {
            for file_name in files.values() {
                let source = self.file_path(version, file_name);
                match tokio::fs::copy(&source, staging.join(file_name)).await {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(RepositoryError::FileNotFound {
                            version: version.to_string(),
                            file: file_name.clone(),
                        });
                    }
                    Err(e) => {
                        return Err(RepositoryError::io(
                            format!("Failed to copy {}", source.display()),
                            e,
                        ));
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn read_file(&self, version: &str, file_name: &str) -> Result<String, RepositoryError> {
        let path = self.file_path(version, file_name);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RepositoryError::FileNotFound {
                    version: version.to_string(),
                    file: file_name.to_string(),
                }
            } else {
                RepositoryError::io(format!("Failed to read {}", path.display()), e)
            }
        })
    }
}

impl Repository for LocalRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_versions(&self) -> BoxFuture<'_, Result<Vec<String>, RepositoryError>> {
        self.read_versions().boxed()
    }

    fn download<'a>(
        &'a self,
        version: &'a str,
        dest_dir: &'a Path,
        files: &'a DownloadFiles,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        self.copy_files(version, dest_dir, files).boxed()
    }

    fn fetch_file_content<'a>(
        &'a self,
        version: &'a str,
        file_name: &'a str,
    ) -> BoxFuture<'a, Result<String, RepositoryError>> {
        self.read_file(version, file_name).boxed()
    }
}
