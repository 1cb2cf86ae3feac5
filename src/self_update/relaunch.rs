//! Re-executing the updated binary with the original arguments.

use crate::constants::SELF_UPDATE_DISABLED_FLAG;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Arguments for the relaunched process.
///
/// Any `--self-update` option given originally is replaced by one that disables
/// self-update, so the new binary does not try to update itself again.
pub fn relaunch_args<I>(original: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = Vec::new();
    let mut skip_value = false;

    for arg in original {
        if skip_value {
            skip_value = false;
            continue;
        }
        match arg.to_str() {
            Some("--self-update") => skip_value = true,
            Some(text) if text.starts_with("--self-update=") => {}
            _ => args.push(arg),
        }
    }

    args.push(OsString::from(SELF_UPDATE_DISABLED_FLAG));
    args
}

/// Replace the current process with `exe` running the current command again.
///
/// On Unix this only returns on failure. Elsewhere the new binary runs as a
/// child with inherited stdio and this process exits with its status.
pub fn relaunch(exe: &Path) -> Result<()> {
    let args = relaunch_args(std::env::args_os().skip(1));
    debug!("Relaunching {} with {:?}", exe.display(), args);

    let mut command = Command::new(exe);
    command.args(&args);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        let error = command.exec();
        Err(error).with_context(|| format!("Failed to relaunch {}", exe.display()))
    }

    #[cfg(not(unix))]
    {
        let status = command
            .status()
            .with_context(|| format!("Failed to relaunch {}", exe.display()))?;
        std::process::exit(status.code().unwrap_or(1));
    }
}
