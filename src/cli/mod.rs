//! Command-line interface for multiwerf.
//!
//! # Commands
//!
//! - `update GROUP CHANNEL` - make the channel's version available, print its path
//! - `use GROUP CHANNEL` - like `update`, but print a shell snippet defining the `werf` alias
//! - `bin-path GROUP CHANNEL` - print the path of an already downloaded version
//! - `gc` - remove versions no channel mapping refers to
//! - `self-update` - update multiwerf itself now
//! - `available-releases` - list published versions
//! - `version` - print multiwerf's version
//!
//! # Global options
//!
//! - `--verbose` / `--quiet` - log and progress verbosity
//! - `--config <FILE>` - configuration file (default `<storage>/config.toml`)
//! - `--storage-dir <DIR>` - storage root (`MULTIWERF_STORAGE_DIR`)
//! - `--self-update <yes|no>` - update multiwerf before `update`/`use` (`MULTIWERF_SELF_UPDATE`)
//! - `--experimental[=<yes|no>]` - consider prereleases of multiwerf (`MULTIWERF_EXPERIMENTAL`)
//! - `--channel-mapping-url <URL>` - remote channel mapping (`MULTIWERF_CHANNEL_MAPPING_URL`)
//! - `--no-progress` - hide download progress bars
//!
//! ```bash
//! source <(multiwerf use 1.1 stable)
//! multiwerf --self-update=no update 1.2 ea
//! MULTIWERF_STORAGE_DIR=/opt/multiwerf multiwerf gc --dry-run
//! ```
//!
//! Stdout carries only what scripts consume; progress and errors go to stderr.

pub mod bin_path;
pub mod gc;
pub mod releases;
pub mod self_update;
pub mod update;

use crate::config::{Config, Overrides};
use crate::constants::SELF_NAME;
use crate::events::TextRenderer;
use crate::logging;
use crate::utils::progress::disable_progress;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure for multiwerf.
#[derive(Parser, Debug)]
#[command(
    name = "multiwerf",
    about = "Version manager for werf",
    version,
    long_about = "multiwerf resolves the werf version published on a release channel, \
                  downloads and verifies it, and keeps itself up to date."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug progress and logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only report warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding downloaded versions and channel mappings.
    #[arg(long, global = true, env = "MULTIWERF_STORAGE_DIR")]
    storage_dir: Option<String>,

    /// Update multiwerf before `update` and `use`.
    #[arg(long, global = true, env = "MULTIWERF_SELF_UPDATE", value_name = "yes|no", value_parser = parse_switch)]
    self_update: Option<bool>,

    /// Update multiwerf to prereleases, ignoring the update delay.
    #[arg(
        long,
        global = true,
        env = "MULTIWERF_EXPERIMENTAL",
        value_name = "yes|no",
        value_parser = parse_switch,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "yes"
    )]
    experimental: Option<bool>,

    /// Location of the remote channel mapping (http(s) or file).
    #[arg(long, global = true, env = "MULTIWERF_CHANNEL_MAPPING_URL")]
    channel_mapping_url: Option<String>,

    /// Disable download progress bars.
    #[arg(long, global = true)]
    no_progress: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the version of a channel and print the binary path.
    Update(update::UpdateCommand),

    /// Download the version of a channel and print a shell snippet using it.
    Use(update::UseCommand),

    /// Print the path of a downloaded version without network access.
    BinPath(bin_path::BinPathCommand),

    /// Remove downloaded versions that no channel mapping refers to.
    Gc(gc::GcCommand),

    /// Update multiwerf itself, ignoring the update delay.
    SelfUpdate(self_update::SelfUpdateCommand),

    /// List published versions.
    AvailableReleases(releases::AvailableReleasesCommand),

    /// Print multiwerf's version.
    Version,
}

impl Cli {
    /// Values from flags and environment for [`Config::resolve`].
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_path: self.config.clone(),
            storage_dir: self.storage_dir.clone(),
            channel_mapping_url: self.channel_mapping_url.clone(),
            self_update: self.self_update,
            experimental: self.experimental,
            verbose: self.verbose,
            quiet: self.quiet,
            no_progress: self.no_progress,
        }
    }

    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        logging::init(self.verbose, self.quiet);
        if self.no_progress {
            disable_progress();
        }

        if matches!(self.command, Commands::Version) {
            println!("{SELF_NAME} v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let config = Config::resolve(self.overrides()).await?;
        match self.command {
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::Use(cmd) => cmd.execute(&config).await,
            Commands::BinPath(cmd) => cmd.execute(&config).await,
            Commands::Gc(cmd) => cmd.execute(&config).await,
            Commands::SelfUpdate(cmd) => cmd.execute(&config).await,
            Commands::AvailableReleases(cmd) => cmd.execute(&config).await,
            Commands::Version => Ok(()),
        }
    }
}

/// Parse `yes`/`no` style switches.
pub fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "on" | "1" => Ok(true),
        "no" | "n" | "false" | "off" | "0" => Ok(false),
        other => Err(format!("expected yes or no, got '{other}'")),
    }
}

/// Progress renderer for a command.
pub(crate) fn renderer(config: &Config) -> TextRenderer<std::io::Stderr> {
    TextRenderer::stderr().quiet(config.quiet)
}
