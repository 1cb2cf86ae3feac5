//! Filesystem and terminal helpers shared across multiwerf.
//!
//! - [`fs`] - atomic writes, backup paths and executable permissions
//! - [`progress`] - download progress bars

pub mod fs;
pub mod progress;
