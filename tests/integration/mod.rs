//! Integration test suite for multiwerf
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: the binary end to end against a mirror directory and a file-based
//!   remote channel mapping
//! - **lifecycle**: update and garbage collection across several channel
//!   mapping generations, through the library API

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod lifecycle;
