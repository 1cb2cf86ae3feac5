//! Core types shared across multiwerf.
//!
//! - [`error`] - command-level errors and user-facing error reports

pub mod error;

pub use error::{ErrorContext, MultiwerfError, user_friendly_error};
