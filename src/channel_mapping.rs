//! Channel mapping documents: which version each channel of each group points at.
//!
//! The authoritative document is published remotely. A copy is kept in the
//! storage directory so commands work offline, and the previous copy is kept as
//! `channel_mapping.json.old` so versions referenced by either generation survive
//! garbage collection.
//!
//! # Wire format
//!
//! ```json
//! {
//!     "multiwerf": [
//!         {
//!             "group": "1.1",
//!             "channels": [
//!                 {
//!                     "name": "alpha",
//!                     "version": "1.1.1-alpha.1"
//!                 }
//!             ]
//!         }
//!     ]
//! }
//! ```
//!
//! Saved documents always use this exact layout: four space indentation, fields
//! in the order shown and a trailing newline.

use crate::constants::{BACKUP_SUFFIX, METADATA_TIMEOUT};
use crate::utils::fs::{atomic_write, with_suffix};
use crate::version::{ParsedVersion, VersionError};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Channel mapping lookup and loading failures.
#[derive(Debug, Error)]
pub enum ChannelMappingError {
    #[error("Channel mapping not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read channel mapping: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse channel mapping: {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Group '{group}' is not in the channel mapping")]
    GroupNotFound { group: String },

    #[error("Channel '{channel}' of group '{group}' is not in the channel mapping")]
    ChannelNotFound { group: String, channel: String },

    #[error("Channel '{channel}' of group '{group}' points at '{version}', which is not a version")]
    InvalidVersion {
        group: String,
        channel: String,
        version: String,
        #[source]
        source: VersionError,
    },
}

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Remote,
    Local,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "multiwerf", default)]
    groups: Vec<GroupEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group: String,
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// A loaded channel mapping document.
#[derive(Debug, Clone)]
pub struct ChannelMapping {
    document: Document,
    origin: Origin,
    modified: bool,
}

impl ChannelMapping {
    /// An empty local document.
    pub fn empty() -> Self {
        Self {
            document: Document::default(),
            origin: Origin::Local,
            modified: false,
        }
    }

    /// Parse a document from JSON text.
    pub fn from_json(content: &str, origin: Origin) -> Result<Self, serde_json::Error> {
        Ok(Self {
            document: serde_json::from_str(content)?,
            origin,
            modified: false,
        })
    }

    /// Fetch the authoritative document.
    ///
    /// `http://` and `https://` locations are fetched with a short timeout and
    /// anything but a successful response is an error. `file://` locations and
    /// plain paths are read from disk, which serves offline mirrors.
    pub async fn load_remote(client: &reqwest::Client, url: &str) -> Result<Self> {
        let content = if url.starts_with("http://") || url.starts_with("https://") {
            let response = client
                .get(url)
                .timeout(METADATA_TIMEOUT)
                .send()
                .await
                .with_context(|| format!("Failed to fetch channel mapping from {url}"))?;
            let status = response.status();
            if !status.is_success() {
                bail!("Failed to fetch channel mapping from {url}: HTTP {status}");
            }
            response
                .text()
                .await
                .with_context(|| format!("Failed to read channel mapping from {url}"))?
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read channel mapping from {path}"))?
        };

        let mapping = Self::from_json(&content, Origin::Remote)
            .with_context(|| format!("Invalid channel mapping received from {url}"))?;
        debug!("Loaded remote channel mapping with {} groups", mapping.groups().len());
        Ok(mapping)
    }

    /// Read a document from the storage directory.
    pub async fn load_local(path: &Path) -> Result<Self, ChannelMappingError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChannelMappingError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(ChannelMappingError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_json(&content, Origin::Local).map_err(|source| ChannelMappingError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn groups(&self) -> &[GroupEntry] {
        &self.document.groups
    }

    /// Canonical JSON text of the document.
    pub fn to_canonical_json(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.document
            .serialize(&mut serializer)
            .context("Failed to serialize channel mapping")?;
        buffer.push(b'\n');
        String::from_utf8(buffer).context("Channel mapping is not valid UTF-8")
    }

    /// Persist the document to `path`, keeping the previous file as `<path>.old`.
    ///
    /// Only remote documents and local documents changed through
    /// [`set_channel_version`](Self::set_channel_version) are written. Returns
    /// whether anything was written.
    pub async fn save(&self, path: &Path) -> Result<bool> {
        if self.origin != Origin::Remote && !self.modified {
            debug!("Not saving unmodified local channel mapping");
            return Ok(false);
        }

        let content = self.to_canonical_json()?;
        let backup = with_suffix(path, BACKUP_SUFFIX);

        match tokio::fs::rename(path, &backup).await {
            Ok(()) => debug!("Moved previous channel mapping to {}", backup.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to back up channel mapping to {}", backup.display())
                });
            }
        }

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || atomic_write(&target, content.as_bytes()))
            .await
            .context("spawn_blocking panicked")?
            .with_context(|| format!("Failed to save channel mapping to {}", path.display()))?;

        Ok(true)
    }

    /// Version the channel of the group points at.
    ///
    /// Entries that do not parse as versions are reported as
    /// [`ChannelMappingError::InvalidVersion`] and never returned, since callers
    /// turn the result into a directory name.
    pub fn channel_version(&self, group: &str, channel: &str) -> Result<String, ChannelMappingError> {
        let entry = self
            .document
            .groups
            .iter()
            .find(|entry| entry.group == group)
            .ok_or_else(|| ChannelMappingError::GroupNotFound {
                group: group.to_string(),
            })?;

        let version = entry
            .channels
            .iter()
            .find(|c| c.name == channel && !c.version.is_empty())
            .map(|c| c.version.as_str())
            .ok_or_else(|| ChannelMappingError::ChannelNotFound {
                group: group.to_string(),
                channel: channel.to_string(),
            })?;

        ParsedVersion::parse(version)
            .map(|parsed| parsed.original().to_string())
            .map_err(|source| ChannelMappingError::InvalidVersion {
                group: group.to_string(),
                channel: channel.to_string(),
                version: version.to_string(),
                source,
            })
    }

    /// Point the channel of the group at `version`, adding entries as needed.
    pub fn set_channel_version(&mut self, group: &str, channel: &str, version: &str) {
        let groups = &mut self.document.groups;
        let index = match groups.iter().position(|entry| entry.group == group) {
            Some(index) => index,
            None => {
                groups.push(GroupEntry {
                    group: group.to_string(),
                    channels: Vec::new(),
                });
                groups.len() - 1
            }
        };

        let channels = &mut groups[index].channels;
        match channels.iter_mut().find(|c| c.name == channel) {
            Some(entry) if entry.version == version => return,
            Some(entry) => entry.version = version.to_string(),
            None => channels.push(ChannelEntry {
                name: channel.to_string(),
                version: version.to_string(),
            }),
        }
        self.modified = true;
    }

    /// Every non-empty version referenced by any group and channel.
    pub fn all_versions(&self) -> BTreeSet<String> {
        self.document
            .groups
            .iter()
            .flat_map(|entry| entry.channels.iter())
            .filter(|c| !c.version.is_empty())
            .map(|c| c.version.clone())
            .collect()
    }
}
