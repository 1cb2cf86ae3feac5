//! The `update` and `use` commands.
//!
//! Both resolve a (group, channel) request, download the version if needed and
//! record it in the local channel mapping. `update` prints the binary path;
//! `use` prints a snippet meant for `source <(multiwerf use 1.1 stable)`.

use super::self_update::auto_self_update;
use crate::cli::renderer;
use crate::config::Config;
use crate::events::run_with_progress;
use crate::workflow::{Request, VersionManager, use_script};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Download the version of a channel.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// MAJOR.MINOR version line, e.g. 1.1
    group: String,

    /// Release channel, e.g. stable
    channel: String,

    /// Fetch the remote channel mapping even if it was checked recently.
    #[arg(long)]
    try_remote_channel_mapping: bool,
}

impl UpdateCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let request = Request::parse(&self.group, &self.channel, &config.channels)?;
        let path = prepare(config, request, self.try_remote_channel_mapping).await?;
        println!("{}", path.display());
        Ok(())
    }
}

/// Download the version of a channel and print a shell snippet for it.
#[derive(Args, Debug)]
pub struct UseCommand {
    /// MAJOR.MINOR version line, e.g. 1.1
    group: String,

    /// Release channel, e.g. stable
    channel: String,

    /// Shell flavour of the printed snippet.
    #[arg(long, default_value = "default", value_parser = ["default"])]
    shell: String,

    /// Fetch the remote channel mapping even if it was checked recently.
    #[arg(long)]
    try_remote_channel_mapping: bool,
}

impl UseCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let request = Request::parse(&self.group, &self.channel, &config.channels)?;
        let path = prepare(config, request.clone(), self.try_remote_channel_mapping).await?;
        print!("{}", use_script(&request, &path));
        Ok(())
    }
}

async fn prepare(config: &Config, request: Request, try_remote: bool) -> Result<PathBuf> {
    auto_self_update(config).await?;

    let manager = VersionManager::from_config(config)?;
    let mut renderer = renderer(config);
    run_with_progress(&mut renderer, config.verbose, "update", move |events| async move {
        manager.update(&request, try_remote, &events).await
    })
    .await
}
