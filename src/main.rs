//! multiwerf CLI entry point
//!
//! Parses arguments, runs the command and turns failures into a colored report
//! on stderr with exit code 1.

use anyhow::Result;
use clap::Parser;
use multiwerf::cli;
use multiwerf::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
