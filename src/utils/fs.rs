//! File system helpers shared by the mapping store and the binary installers.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sibling path with `suffix` appended to the file name.
///
/// ```rust
/// use multiwerf::utils::fs::with_suffix;
/// use std::path::Path;
///
/// assert_eq!(
///     with_suffix(Path::new("/data/channel_mapping.json"), ".old"),
///     Path::new("/data/channel_mapping.json.old")
/// );
/// ```
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// The content goes to `<path>.tmp`, is synced to disk and then renamed over
/// the target, so readers never observe a partially written file. Parent
/// directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let temp_path = with_suffix(path, ".tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().context("Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// Add execute permission for everyone who can read the file.
#[cfg(unix)]
pub fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .with_context(|| format!("Failed to read permissions: {}", path.display()))?
        .permissions();
    let mode = permissions.mode();
    permissions.set_mode(mode | ((mode & 0o444) >> 2));
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to make executable: {}", path.display()))
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
