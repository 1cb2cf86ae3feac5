//! The `self-update` command and the automatic update run before `update`/`use`.

use crate::cli::renderer;
use crate::config::Config;
use crate::events::run_with_progress;
use crate::self_update::{ReplaceError, SelfUpdateOutcome, SelfUpdater, relaunch};
use anyhow::Result;
use clap::Args;
use tracing::warn;

const STAGE: &str = "self-update";

/// Update multiwerf now.
#[derive(Args, Debug)]
pub struct SelfUpdateCommand {}

impl SelfUpdateCommand {
    pub async fn execute(self, config: &Config) -> Result<()> {
        run_self_update(config, true).await?;
        Ok(())
    }
}

/// Run the self-update engine with progress on stderr.
pub async fn run_self_update(config: &Config, force: bool) -> Result<SelfUpdateOutcome> {
    let updater = SelfUpdater::new(config.self_backends()?, &config.storage(), config.self_update_delay)
        .experimental(config.experimental)
        .force(force);

    let mut renderer = renderer(config);
    run_with_progress(&mut renderer, config.verbose, STAGE, move |events| async move {
        updater.run(&events).await
    })
    .await
}

/// Self-update before a command, restarting into the new binary if one was
/// installed.
///
/// A failed binary swap stops the command. Any other failure is logged and the
/// command goes on with the running version.
pub async fn auto_self_update(config: &Config) -> Result<()> {
    if !config.self_update {
        return Ok(());
    }

    match run_self_update(config, false).await {
        Ok(SelfUpdateOutcome::Updated { path, .. }) => relaunch(&path),
        Ok(_) => Ok(()),
        Err(e) if e.downcast_ref::<ReplaceError>().is_some() => Err(e),
        Err(e) => {
            warn!("Self-update failed: {e:#}");
            Ok(())
        }
    }
}
