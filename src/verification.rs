//! SHA-256 verification of downloaded binaries against a checksum manifest.
//!
//! Every release publishes a `SHA256SUMS` manifest next to its binaries. Each
//! relevant line is a 64 character hex digest, a space, a one character mode
//! marker (space for text mode, `*` for binary mode) and the file name:
//!
//! ```text
//! 5f70bf18a086007016e948b04aed3b82103a36bea41755b6cddfaf10ace3c6ef *werf-linux-amd64-v1.1.0
//! 0263829989b6fd954f72baaf2fc64bc2e2f01d692d4de72986ea808f6e99813f  werf-darwin-amd64-v1.1.0
//! ```
//!
//! Lines that do not follow this shape are ignored.
//!
//! A verification failure is reported as [`VerificationError`] so callers can
//! treat it like any other failed download and fall back to the next backend.

use anyhow::{Context, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::debug;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Checksum verification failures.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Checksum manifest has no entry for '{file}'")]
    MissingEntry { file: String },

    #[error("Checksum mismatch for '{file}'\n  Expected: {expected}\n  Actual:   {actual}")]
    Mismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

/// Parsed checksum manifest: file name to lowercase hex digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: BTreeMap<String, String>,
}

impl ChecksumManifest {
    /// Parse manifest text, skipping lines that are not checksum entries.
    ///
    /// ```rust
    /// use multiwerf::verification::ChecksumManifest;
    ///
    /// let digest = "a".repeat(64);
    /// let manifest = ChecksumManifest::parse(&format!("{digest} *werf\nnot a checksum\n")).unwrap();
    /// assert_eq!(manifest.checksum_for("werf"), Some(digest.as_str()));
    /// assert_eq!(manifest.len(), 1);
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let line_pattern = Regex::new(r"^([0-9a-fA-F]{64}) [ *](.+)$")
            .context("Failed to compile checksum line pattern")?;

        let entries = content
            .lines()
            .filter_map(|line| line_pattern.captures(line.trim_end_matches('\r')))
            .map(|captures| (captures[2].to_string(), captures[1].to_ascii_lowercase()))
            .collect();

        Ok(Self { entries })
    }

    pub fn checksum_for(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute the lowercase hex SHA-256 digest of a file.
pub async fn compute_sha256(path: &Path) -> Result<String> {
    debug!("Computing SHA256 checksum for: {}", path.display());

    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify `path` against a hex digest, ignoring case.
pub async fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    let actual = compute_sha256(path).await?;
    if !actual.eq_ignore_ascii_case(expected) {
        let file = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        return Err(VerificationError::Mismatch {
            file,
            expected: expected.to_ascii_lowercase(),
            actual,
        }
        .into());
    }

    debug!("Checksum verified for: {}", path.display());
    Ok(())
}

/// Verify `path` against the manifest entry for `file_name`.
pub async fn verify_against_manifest(
    path: &Path,
    file_name: &str,
    manifest: &ChecksumManifest,
) -> Result<()> {
    let expected = manifest.checksum_for(file_name).ok_or_else(|| VerificationError::MissingEntry {
        file: file_name.to_string(),
    })?;
    verify_checksum(path, expected).await
}
