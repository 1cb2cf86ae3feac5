//! Swapping the running executable for a freshly downloaded one.
//!
//! The swap is two renames: the current binary moves aside to `<exe>.old`, then
//! the new binary moves into its place. If the second rename fails the first is
//! undone. Both renames stay within one directory, so each is atomic.

use crate::constants::BACKUP_SUFFIX;
use crate::utils::fs::{set_executable, with_suffix};
use anyhow::{Context, Result, bail};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Failures while replacing the executable.
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// Moving the current binary aside failed; nothing changed.
    #[error("Failed to move {path} aside")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Installing the new binary failed; the previous binary was restored.
    #[error("Failed to install new binary at {path}; previous binary restored")]
    Install {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Installing failed and restoring the previous binary failed too.
    #[error(
        "Failed to install new binary at {path}: {original}; restoring the previous binary from {backup} also failed: {rollback}"
    )]
    RollbackFailed {
        path: PathBuf,
        backup: PathBuf,
        original: io::Error,
        rollback: io::Error,
    },
}

/// Replace `current` with `replacement`, keeping the current binary on failure.
pub fn replace_binary(current: &Path, replacement: &Path) -> Result<(), ReplaceError> {
    replace_with(current, replacement, |from, to| std::fs::rename(from, to))
}

fn replace_with<F>(current: &Path, replacement: &Path, rename: F) -> Result<(), ReplaceError>
where
    F: Fn(&Path, &Path) -> io::Result<()>,
{
    let backup = with_suffix(current, BACKUP_SUFFIX);

    rename(current, &backup).map_err(|source| ReplaceError::Backup {
        path: current.to_path_buf(),
        source,
    })?;

    if let Err(original) = rename(replacement, current) {
        return match rename(&backup, current) {
            Ok(()) => Err(ReplaceError::Install {
                path: current.to_path_buf(),
                source: original,
            }),
            Err(rollback) => Err(ReplaceError::RollbackFailed {
                path: current.to_path_buf(),
                backup,
                original,
                rollback,
            }),
        };
    }

    // A running executable cannot be deleted on Windows; the next update overwrites it.
    if !cfg!(windows) {
        if let Err(e) = std::fs::remove_file(&backup) {
            warn!("Failed to remove {}: {}", backup.display(), e);
        }
    }

    debug!("Replaced {}", current.display());
    Ok(())
}

/// Make `replacement` executable and swap it in for `current`.
pub fn install_binary(current: &Path, replacement: &Path) -> Result<()> {
    set_executable(replacement)?;
    replace_binary(current, replacement)?;
    Ok(())
}

/// Check that the current user may replace the executable at `path`.
///
/// On Unix the file must be owned by the effective user and carry the owner
/// write bit. Elsewhere the read-only attribute must be clear.
pub fn check_writable(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to inspect executable: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        // SAFETY: geteuid takes no arguments, cannot fail and touches no memory.
        let euid = unsafe { libc::geteuid() };
        if metadata.uid() != euid {
            bail!(
                "{} is owned by uid {}, not by the current user (uid {})",
                path.display(),
                metadata.uid(),
                euid
            );
        }
        if metadata.mode() & 0o200 == 0 {
            bail!("{} is not writable by its owner", path.display());
        }
    }

    #[cfg(not(unix))]
    if metadata.permissions().readonly() {
        bail!("{} is read-only", path.display());
    }

    Ok(())
}
