//! The `gc` command.

use crate::cli::renderer;
use crate::config::Config;
use crate::events::run_with_progress;
use crate::gc::collect_garbage;
use anyhow::Result;
use clap::Args;

/// Remove unreferenced versions.
#[derive(Args, Debug)]
pub struct GcCommand {
    /// Report what would be removed without removing it.
    #[arg(long)]
    dry_run: bool,
}

impl GcCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        let storage = config.storage();
        let dry_run = self.dry_run;
        let mut renderer = renderer(config);

        run_with_progress(&mut renderer, config.verbose, "gc", move |events| async move {
            collect_garbage(&storage, dry_run, &events).await
        })
        .await?;
        Ok(())
    }
}
