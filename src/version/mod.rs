//! Semantic version parsing and channel resolution for managed releases.
//!
//! Release versions published by a repository are arbitrary semantic versions,
//! for example `1.1.0-alpha.1`, `1.1.0-rc.2` or `1.1.0`. Users do not ask for one
//! of these directly. They ask for a *group* (a `MAJOR.MINOR` release line) and a
//! *channel* (a quality tier such as `alpha` or `stable`), and this module turns
//! that request into a single concrete version.
//!
//! # Module Organization
//!
//! - [`channel`] - Channel names, their priority order and prerelease matching
//! - [`resolver`] - The channel resolution algorithm and [`highest_version`]
//! - Core types: [`ParsedVersion`] and [`Group`]
//!
//! # Examples
//!
//! ```rust
//! use multiwerf::version::{ChannelOrder, resolve};
//!
//! # fn example() -> anyhow::Result<()> {
//! let order = ChannelOrder::default();
//! let available = vec![
//!     "1.1.0-alpha.1".to_string(),
//!     "1.1.0".to_string(),
//!     "1.1.1-alpha.1".to_string(),
//! ];
//!
//! let stable = resolve("1.1", "stable", &available, &order)?;
//! assert_eq!(stable.as_deref(), Some("1.1.0"));
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod resolver;

pub use channel::{Channel, ChannelOrder};
pub use resolver::{highest_version, resolve};

use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors produced while parsing versions, groups and channels.
#[derive(Debug, Error)]
pub enum VersionError {
    /// A candidate or requested version is not a valid semantic version.
    #[error("Invalid version '{input}'")]
    InvalidVersion {
        input: String,
        #[source]
        source: semver::Error,
    },

    /// A group is not of the form `MAJOR.MINOR`.
    #[error("Invalid group '{input}': expected MAJOR.MINOR, e.g. 1.1")]
    InvalidGroup { input: String },

    /// A channel name is not part of the configured channel order.
    #[error("Unknown channel '{name}': expected one of {known}")]
    UnknownChannel { name: String, known: String },

    /// A channel order cannot be used for resolution.
    #[error("Invalid channel order: {reason}")]
    InvalidChannelOrder { reason: String },
}

/// A semantic version together with the exact text it was parsed from.
///
/// Ordering helpers use semantic version precedence, so build metadata never
/// influences comparisons, but [`original`](Self::original) keeps it intact for
/// reporting and for lookups against repositories.
#[derive(Debug, Clone)]
pub struct ParsedVersion {
    version: Version,
    original: String,
}

impl ParsedVersion {
    /// Parse a version string, accepting an optional leading `v`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let version = Version::parse(bare).map_err(|source| VersionError::InvalidVersion {
            input: input.to_string(),
            source,
        })?;

        Ok(Self {
            version,
            original: trimmed.to_string(),
        })
    }

    pub fn semver(&self) -> &Version {
        &self.version
    }

    /// The text this version was parsed from, build metadata included.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    /// The prerelease label, empty for stable releases.
    pub fn prerelease(&self) -> &str {
        self.version.pre.as_str()
    }

    pub fn is_stable(&self) -> bool {
        self.version.pre.is_empty()
    }

    /// Compare by semantic version precedence, ignoring build metadata.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.version.cmp_precedence(&other.version)
    }

    /// Whether this version belongs to the given release line.
    pub fn in_group(&self, group: &Group) -> bool {
        self.major() == group.major && self.minor() == group.minor
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// A `MAJOR.MINOR` release line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Group {
    pub major: u64,
    pub minor: u64,
}

impl Group {
    /// Parse a group such as `1.1`.
    ///
    /// Both components must be plain decimal numbers; `1`, `1.1.0` and `v1.1`
    /// are rejected.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidGroup {
            input: input.to_string(),
        };

        let (major, minor) = input.trim().split_once('.').ok_or_else(invalid)?;
        let is_number = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
        if !is_number(major) || !is_number(minor) {
            return Err(invalid());
        }

        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
