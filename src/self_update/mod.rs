//! Keeping this tool's own executable current.
//!
//! - [`engine`] - the locked, throttled, multi-backend update run
//! - [`replace`] - swapping the executable with rollback
//! - [`relaunch`] - re-running the current command with the new binary

pub mod engine;
pub mod relaunch;
pub mod replace;

pub use engine::{SelfUpdateOutcome, SelfUpdater};
pub use relaunch::relaunch;
pub use replace::{ReplaceError, replace_binary};
