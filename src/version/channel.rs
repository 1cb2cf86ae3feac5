//! Release channels and their priority order.
//!
//! A channel is a named quality tier. Channels are ordered from the lowest
//! priority (`alpha`) to the highest (`stable`). The `stable` channel matches
//! versions without a prerelease label; every other channel matches a prerelease
//! label that equals the channel name or starts with `<channel>.`.

use super::{ParsedVersion, VersionError};
use std::fmt;

/// Name of the highest-priority channel, reserved for releases without a prerelease label.
pub const STABLE: &str = "stable";

/// A single release channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel(String);

impl Channel {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_stable(&self) -> bool {
        self.0 == STABLE
    }

    /// Whether a prerelease label belongs to this channel.
    ///
    /// ```rust
    /// use multiwerf::version::ChannelOrder;
    ///
    /// let order = ChannelOrder::default();
    /// let rc = order.parse_channel("rc").unwrap();
    /// assert!(rc.matches_prerelease("rc"));
    /// assert!(rc.matches_prerelease("rc.2"));
    /// assert!(!rc.matches_prerelease("rc2"));
    /// assert!(!rc.matches_prerelease(""));
    /// ```
    pub fn matches_prerelease(&self, prerelease: &str) -> bool {
        if self.is_stable() {
            return prerelease.is_empty();
        }
        prerelease == self.0
            || prerelease
                .strip_prefix(self.0.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channels ordered from lowest to highest priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOrder {
    channels: Vec<Channel>,
}

impl Default for ChannelOrder {
    fn default() -> Self {
        Self {
            channels: ["alpha", "beta", "rc", STABLE]
                .into_iter()
                .map(|name| Channel(name.to_string()))
                .collect(),
        }
    }
}

impl ChannelOrder {
    /// Build a custom channel order.
    ///
    /// Names must be unique, non-empty and free of dots, and the list must end
    /// with `stable`.
    pub fn new<I, S>(names: I) -> Result<Self, VersionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels: Vec<Channel> = names.into_iter().map(|name| Channel(name.into())).collect();
        let invalid = |reason: String| VersionError::InvalidChannelOrder { reason };

        match channels.last() {
            Some(last) if last.is_stable() => {}
            Some(last) => return Err(invalid(format!("last channel must be '{STABLE}', got '{last}'"))),
            None => return Err(invalid("no channels given".to_string())),
        }

        for (index, channel) in channels.iter().enumerate() {
            if channel.0.is_empty() || channel.0.contains('.') {
                return Err(invalid(format!("invalid channel name '{channel}'")));
            }
            if channels[..index].contains(channel) {
                return Err(invalid(format!("duplicate channel '{channel}'")));
            }
        }

        Ok(Self { channels })
    }

    /// Validate a user-supplied channel name against this order.
    pub fn parse_channel(&self, name: &str) -> Result<Channel, VersionError> {
        self.channels.iter().find(|c| c.0 == name).cloned().ok_or_else(|| {
            VersionError::UnknownChannel {
                name: name.to_string(),
                known: self.names().join(", "),
            }
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(Channel::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn index_of(&self, channel: &Channel) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }

    /// Index of the channel a version natively belongs to.
    ///
    /// Channels are checked in priority order and the last match wins, so for
    /// well-formed labels there is a single candidate. Returns `None` for a
    /// prerelease label that no channel recognizes.
    pub fn native_index(&self, version: &ParsedVersion) -> Option<usize> {
        let prerelease = version.prerelease();
        self.channels
            .iter()
            .rposition(|channel| channel.matches_prerelease(prerelease))
    }
}
