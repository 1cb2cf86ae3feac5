//! Tracing subscriber setup.
//!
//! Diagnostics go to stderr through `tracing`. Progress events are rendered
//! separately by [`crate::events::TextRenderer`]; stdout carries only command
//! output that scripts consume.

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();
static INIT_TEST_LOGGING: Once = Once::new();

/// Filter directive for the requested verbosity.
///
/// `--verbose` wins over `--quiet`. Without either flag `RUST_LOG` is honored,
/// falling back to warnings only.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("multiwerf=debug,info")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Install the global subscriber. Later calls do nothing.
pub fn init(verbose: bool, quiet: bool) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter_for(verbose, quiet))
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .without_time()
            .try_init();
    });
}

/// Initialize logging for tests.
///
/// Uses `level` if given, otherwise `RUST_LOG`; with neither, tests stay silent.
pub fn init_test_logging(level: Option<Level>) {
    INIT_TEST_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
