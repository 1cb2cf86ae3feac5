//! Removal of cached versions no channel mapping refers to any more.
//!
//! The versions worth keeping are those referenced by the current channel
//! mapping or by its previous generation. Every other version directory in the
//! storage directory is removed. Directories whose names are not versions are
//! never touched.

use crate::channel_mapping::{ChannelMapping, ChannelMappingError};
use crate::constants::GC_LOCK;
use crate::events::{EventSender, ProgressEvent};
use crate::lock::LockManager;
use crate::storage::Storage;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::debug;

const STAGE: &str = "gc";

/// What a collection found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Versions referenced by either mapping document.
    pub referenced: BTreeSet<String>,
    /// Version directories present before the collection.
    pub local: BTreeSet<String>,
    /// Versions removed, or that would be removed in a dry run.
    pub removed: Vec<String>,
    pub dry_run: bool,
    /// The collection did not run because another process holds the lock.
    pub skipped: bool,
}

/// Remove unreferenced version directories.
///
/// # Errors
///
/// - a mapping document exists but cannot be read or parsed (nothing is removed)
/// - a version directory cannot be removed; the remaining ones are left alone
pub async fn collect_garbage(storage: &Storage, dry_run: bool, events: &EventSender) -> Result<GcReport> {
    collect_garbage_with(storage, dry_run, events, |dir| async move {
        tokio::fs::remove_dir_all(dir).await
    })
    .await
}

/// [`collect_garbage`] with the directory remover supplied by the caller.
async fn collect_garbage_with<F, Fut>(
    storage: &Storage,
    dry_run: bool,
    events: &EventSender,
    remove: F,
) -> Result<GcReport>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut report = GcReport {
        dry_run,
        ..GcReport::default()
    };

    let locks = LockManager::new(storage.root());
    let _lock = match locks.try_acquire(GC_LOCK).await {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            events
                .send(ProgressEvent::warn(STAGE, "Another process is using the version cache, skipping"))
                .await?;
            report.skipped = true;
            return Ok(report);
        }
        Err(e) => {
            events
                .send(
                    ProgressEvent::warn(STAGE, "Cannot take the cache lock, skipping")
                        .with_comment(format!("{e:#}")),
                )
                .await?;
            report.skipped = true;
            return Ok(report);
        }
    };

    for path in [storage.channel_mapping_path(), storage.channel_mapping_backup_path()] {
        report.referenced.extend(referenced_versions(&path).await?);
    }
    report.local = storage.list_version_dirs().await?.into_iter().collect();

    events
        .send(ProgressEvent::debug(
            STAGE,
            format!(
                "{} versions referenced, {} versions cached",
                report.referenced.len(),
                report.local.len()
            ),
        ))
        .await?;

    let to_remove: Vec<String> = report.local.difference(&report.referenced).cloned().collect();
    if to_remove.is_empty() {
        events.send(ProgressEvent::ok(STAGE, "Nothing to clean")).await?;
        return Ok(report);
    }

    let verb = if dry_run { "Would remove" } else { "Removing" };
    events
        .send(ProgressEvent::ok(
            STAGE,
            format!("{verb} {} unused versions: {}", to_remove.len(), to_remove.join(", ")),
        ))
        .await?;

    for version in to_remove {
        if !dry_run {
            let dir = storage.version_dir(&version)?;
            remove(dir.clone())
                .await
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
            events.send(ProgressEvent::ok(STAGE, format!("Removed {version}"))).await?;
        }
        report.removed.push(version);
    }

    Ok(report)
}

async fn referenced_versions(path: &Path) -> Result<BTreeSet<String>> {
    match ChannelMapping::load_local(path).await {
        Ok(mapping) => Ok(mapping.all_versions()),
        Err(ChannelMappingError::NotFound { .. }) => {
            debug!("No channel mapping at {}", path.display());
            Ok(BTreeSet::new())
        }
        Err(e) => Err(e.into()),
    }
}
