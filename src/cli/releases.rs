//! The `available-releases` command.

use crate::cli::renderer;
use crate::config::Config;
use crate::events::run_with_progress;
use crate::workflow::VersionManager;
use anyhow::Result;
use clap::Args;

/// List published versions, oldest first.
#[derive(Args, Debug)]
pub struct AvailableReleasesCommand {
    /// Only list versions of this MAJOR.MINOR line.
    group: Option<String>,
}

impl AvailableReleasesCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let manager = VersionManager::from_config(config)?;
        let group = self.group;
        let mut renderer = renderer(config);

        let versions = run_with_progress(&mut renderer, config.verbose, "releases", move |events| async move {
            manager.available_releases(group.as_deref(), &events).await
        })
        .await?;

        for version in versions {
            println!("{version}");
        }
        Ok(())
    }
}
