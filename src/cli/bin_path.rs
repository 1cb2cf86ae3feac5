//! The `bin-path` command.

use crate::config::Config;
use crate::workflow::{Request, VersionManager};
use anyhow::Result;
use clap::Args;

/// Print the binary of a downloaded version; never touches the network.
#[derive(Args, Debug)]
pub struct BinPathCommand {
    /// MAJOR.MINOR version line, e.g. 1.1
    group: String,

    /// Release channel, e.g. stable
    channel: String,
}

impl BinPathCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let request = Request::parse(&self.group, &self.channel, &config.channels)?;
        let manager = VersionManager::from_config(config)?;
        let path = manager.bin_path(&request).await?;
        println!("{}", path.display());
        Ok(())
    }
}
