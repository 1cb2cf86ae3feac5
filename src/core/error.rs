//! Error handling for multiwerf.
//!
//! Library code returns `anyhow::Result` with context attached at each layer,
//! and subsystems define their own `thiserror` enums for failures callers need
//! to tell apart ([`ChannelMappingError`], [`ReplaceError`], [`VersionError`],
//! and so on). [`MultiwerfError`] holds the command-level failures that end a
//! run.
//!
//! At the top of the program [`user_friendly_error`] turns whatever came back
//! into an [`ErrorContext`]: the error itself plus optional details and a
//! suggestion, printed in color on stderr.
//!
//! ```rust,no_run
//! use multiwerf::core::{MultiwerfError, user_friendly_error};
//!
//! let error = anyhow::Error::new(MultiwerfError::VersionNotFound {
//!     group: "1.1".to_string(),
//!     channel: "rc".to_string(),
//! });
//! user_friendly_error(error).display();
//! ```
//!
//! [`ChannelMappingError`]: crate::channel_mapping::ChannelMappingError
//! [`ReplaceError`]: crate::self_update::ReplaceError
//! [`VersionError`]: crate::version::VersionError

use crate::channel_mapping::ChannelMappingError;
use crate::events::EventBusError;
use crate::self_update::ReplaceError;
use crate::version::VersionError;
use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Command-level failures.
#[derive(Error, Debug, Clone)]
pub enum MultiwerfError {
    /// A command argument is malformed.
    #[error("Invalid argument: {message}")]
    InvalidInput { message: String },

    /// No published version is visible on the requested channel.
    #[error("No version found for group {group} on channel {channel}")]
    VersionNotFound { group: String, channel: String },

    /// The channel's version is not in the local cache.
    #[error("Version {version} for group {group} on channel {channel} is not downloaded")]
    NotDownloaded {
        group: String,
        channel: String,
        version: String,
    },

    /// Every backend failed to deliver a version.
    #[error("Failed to download version {version} from any backend")]
    DownloadFailed { version: String },

    /// The configuration file is unusable.
    #[error("Invalid configuration in {path}: {reason}")]
    ConfigError { path: String, reason: String },

    #[error("{message}")]
    Other { message: String },
}

/// An error together with guidance for the user.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: MultiwerfError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: MultiwerfError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Attach guidance to an error returned from a command.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = format!("{error:#}");

    if let Some(e) = error.downcast_ref::<MultiwerfError>() {
        return describe(e.clone(), &chain);
    }

    if let Some(e) = error.downcast_ref::<VersionError>() {
        let context = ErrorContext::new(MultiwerfError::InvalidInput {
            message: e.to_string(),
        });
        return match e {
            VersionError::InvalidGroup { .. } => {
                context.with_suggestion("Pass the group as MAJOR.MINOR, for example 1.1")
            }
            VersionError::UnknownChannel { .. } => {
                context.with_suggestion("Use one of the channels listed above")
            }
            _ => context,
        };
    }

    if let Some(e) = error.downcast_ref::<ReplaceError>() {
        let context = ErrorContext::new(other(&chain));
        return match e {
            ReplaceError::RollbackFailed { backup, .. } => context
                .with_details(format!("The previous executable is still at {}", backup.display()))
                .with_suggestion("Move it back into place by hand or reinstall multiwerf"),
            _ => context.with_suggestion("Check permissions of the directory holding multiwerf"),
        };
    }

    if let Some(e) = error.downcast_ref::<ChannelMappingError>() {
        let context = ErrorContext::new(other(&chain));
        return match e {
            ChannelMappingError::Parse { path, .. } => context.with_suggestion(format!(
                "Delete {} and run `multiwerf update` to fetch a fresh copy",
                path.display()
            )),
            ChannelMappingError::NotFound { .. } => context
                .with_suggestion("Run `multiwerf update` with network access to fetch the channel mapping"),
            ChannelMappingError::InvalidVersion { .. } => context
                .with_details("Channel mapping entries must be versions such as 1.1.3 or 1.2.0-beta.2")
                .with_suggestion("Check the channel mapping URL, or delete the local channel mapping and retry"),
            _ => context,
        };
    }

    if error.downcast_ref::<EventBusError>().is_some() {
        return ErrorContext::new(other(&chain))
            .with_details("The command stopped without reporting a result")
            .with_suggestion("Re-run with --verbose to see more detail");
    }

    if let Some(e) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(MultiwerfError::ConfigError {
            path: "config.toml".to_string(),
            reason: e.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the configuration file");
    }

    if let Some(io_error) = error.root_cause().downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(other(&chain))
                .with_suggestion("Check ownership of the storage directory or set MULTIWERF_STORAGE_DIR");
        }
    }

    ErrorContext::new(other(&chain))
}

fn other(message: &str) -> MultiwerfError {
    MultiwerfError::Other {
        message: message.to_string(),
    }
}

fn describe(error: MultiwerfError, chain: &str) -> ErrorContext {
    match &error {
        MultiwerfError::VersionNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run `multiwerf available-releases` to see what is published"),
        MultiwerfError::NotDownloaded { group, channel, .. } => {
            let suggestion = format!("Run `multiwerf update {group} {channel}` first");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        MultiwerfError::DownloadFailed { .. } => {
            ErrorContext::new(error).with_details(chain.to_string()).with_suggestion(
                "Check network access to the configured repositories or try again later",
            )
        }
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_not_downloaded_suggests_update() {
        let error = anyhow::Error::new(MultiwerfError::NotDownloaded {
            group: "1.1".to_string(),
            channel: "stable".to_string(),
            version: "1.1.0".to_string(),
        });
        let context = user_friendly_error(error);
        assert_eq!(context.suggestion.as_deref(), Some("Run `multiwerf update 1.1 stable` first"));
    }

    #[test]
    fn test_version_error_is_input_error() {
        let error = anyhow::Error::new(VersionError::InvalidGroup {
            input: "1".to_string(),
        });
        let context = user_friendly_error(error);
        assert!(matches!(context.error, MultiwerfError::InvalidInput { .. }));
        assert!(context.suggestion.unwrap().contains("MAJOR.MINOR"));
    }

    #[test]
    fn test_context_chain_is_kept() {
        let error = Err::<(), _>(std::io::Error::other("disk on fire"))
            .context("Failed to write channel mapping")
            .unwrap_err();
        let context = user_friendly_error(error);
        let message = context.to_string();
        assert!(message.contains("Failed to write channel mapping"));
        assert!(message.contains("disk on fire"));
    }

    #[test]
    fn test_display_formats_all_parts() {
        let context = ErrorContext::new(MultiwerfError::Other {
            message: "boom".to_string(),
        })
        .with_details("details here")
        .with_suggestion("try again");
        assert_eq!(context.to_string(), "boom\nDetails: details here\nSuggestion: try again");
    }
}
