//! GitHub Releases backend.
//!
//! Versions are the tag names of non-draft releases with the leading `v`
//! removed. Release files are fetched from the public download endpoint:
//!
//! ```text
//! {download_url}/{owner}/{repo}/releases/download/v{version}/{file}
//! ```
//!
//! Metadata requests (listings, manifests) use a short timeout and listings are
//! retried with exponential backoff. Binary downloads are streamed to disk with
//! a progress bar and a generous timeout.

use super::{DownloadFiles, Repository, RepositoryError, install_atomically};
use crate::constants::{
    DOWNLOAD_TIMEOUT, LIST_VERSIONS_RETRIES, MAX_BACKOFF_DELAY_MS, METADATA_TIMEOUT,
    STARTING_BACKOFF_DELAY_MS,
};
use crate::utils::progress::DownloadProgress;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_DOWNLOAD_URL: &str = "https://github.com";

const RELEASES_PER_PAGE: usize = 100;
const MAX_RELEASE_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    draft: bool,
}

/// Releases of one GitHub repository.
#[derive(Debug, Clone)]
pub struct GitHubRepository {
    name: String,
    repo: String,
    api_url: String,
    download_url: String,
    client: reqwest::Client,
}

impl GitHubRepository {
    /// Backend for `owner/repo` on github.com.
    pub fn new(repo: &str) -> Result<Self> {
        Self::with_base_urls(repo, DEFAULT_API_URL, DEFAULT_DOWNLOAD_URL)
    }

    /// Backend for `owner/repo` on a GitHub-compatible host.
    pub fn with_base_urls(repo: &str, api_url: &str, download_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("multiwerf/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(METADATA_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            name: format!("github {repo}"),
            repo: repo.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            download_url: download_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn file_url(&self, version: &str, file_name: &str) -> String {
        let tag = version.strip_prefix('v').unwrap_or(version);
        format!("{}/{}/releases/download/v{tag}/{file_name}", self.download_url, self.repo)
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, RepositoryError> {
        let response = self.client.get(url).timeout(timeout).send().await.map_err(|source| {
            RepositoryError::Http {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepositoryError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    async fn fetch_release_page(&self, page: usize) -> Result<Vec<Release>, RepositoryError> {
        let url = format!(
            "{}/repos/{}/releases?per_page={RELEASES_PER_PAGE}&page={page}",
            self.api_url, self.repo
        );
        debug!("Listing releases: {url}");

        let response = self.get(&url, METADATA_TIMEOUT).await?;
        response.json::<Vec<Release>>().await.map_err(|e| RepositoryError::InvalidResponse {
            url,
            reason: e.to_string(),
        })
    }

    async fn fetch_versions(&self) -> Result<Vec<String>, RepositoryError> {
        let mut versions = Vec::new();

        for page in 1..=MAX_RELEASE_PAGES {
            let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
                .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
                .take(LIST_VERSIONS_RETRIES);
            let releases = Retry::spawn(strategy, || self.fetch_release_page(page)).await?;

            let count = releases.len();
            versions.extend(
                releases
                    .into_iter()
                    .filter(|release| !release.draft)
                    .map(|release| {
                        release.tag_name.strip_prefix('v').unwrap_or(&release.tag_name).to_string()
                    }),
            );

            if count < RELEASES_PER_PAGE {
                break;
            }
        }

        debug!("{} lists {} versions", self.name, versions.len());
        Ok(versions)
    }

    async fn stream_to_file(&self, url: &str, file_name: &str, dest: &Path) -> Result<(), RepositoryError> {
        let response = self.get(url, DOWNLOAD_TIMEOUT).await?;
        let progress = DownloadProgress::new(file_name, response.content_length());

        let write_error =
            |e: std::io::Error| RepositoryError::io(format!("Failed to write {}", dest.display()), e);
        let mut file = tokio::fs::File::create(dest).await.map_err(write_error)?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| RepositoryError::Http {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(write_error)?;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await.map_err(write_error)?;
        progress.finish_and_clear();

        debug!("Downloaded {url} ({} bytes)", progress.position());
        Ok(())
    }

    async fn download_files(
        &self,
        version: &str,
        dest_dir: &Path,
        files: &DownloadFiles,
    ) -> Result<(), RepositoryError> {
        install_atomically(dest_dir, |staging| async move {
            for file_name in files.values() {
                let url = self.file_url(version, file_name);
                match self.stream_to_file(&url, file_name, &staging.join(file_name)).await {
                    Err(RepositoryError::Status { status, .. })
                        if status == reqwest::StatusCode::NOT_FOUND =>
                    {
                        return Err(RepositoryError::FileNotFound {
                            version: version.to_string(),
                            file: file_name.clone(),
                        });
                    }
                    other => other?,
                }
            }
            Ok(())
        })
        .await
    }

    async fn fetch_text(&self, version: &str, file_name: &str) -> Result<String, RepositoryError> {
        let url = self.file_url(version, file_name);
        let response = match self.get(&url, METADATA_TIMEOUT).await {
            Err(RepositoryError::Status { status, .. }) if status == reqwest::StatusCode::NOT_FOUND => {
                return Err(RepositoryError::FileNotFound {
                    version: version.to_string(),
                    file: file_name.to_string(),
                });
            }
            other => other?,
        };

        response.text().await.map_err(|source| RepositoryError::Http { url, source })
    }
}

impl Repository for GitHubRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_versions(&self) -> BoxFuture<'_, Result<Vec<String>, RepositoryError>> {
        self.fetch_versions().boxed()
    }

    fn download<'a>(
        &'a self,
        version: &'a str,
        dest_dir: &'a Path,
        files: &'a DownloadFiles,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        self.download_files(version, dest_dir, files).boxed()
    }

    fn fetch_file_content<'a>(
        &'a self,
        version: &'a str,
        file_name: &'a str,
    ) -> BoxFuture<'a, Result<String, RepositoryError>> {
        self.fetch_text(version, file_name).boxed()
    }
}
