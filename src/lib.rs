//! multiwerf - version manager for werf
//!
//! Given a MAJOR.MINOR version line ("group") and a release channel (alpha, beta,
//! rc, stable), multiwerf works out which concrete werf version the channel
//! currently points to, downloads and verifies that binary into a local cache,
//! and keeps both werf and itself current.
//!
//! # Architecture Overview
//!
//! Three subsystems do the real work:
//!
//! - **Channel resolution** ([`version`]) maps a pool of published versions onto
//!   the ordered channel hierarchy. Within a patch, a release on a higher channel
//!   is also visible on every lower channel.
//! - **Self-update** ([`self_update`]) replaces the running executable with the
//!   newest verified release, at most once per delay interval, falling back from
//!   one backend to the next and rolling back a failed swap.
//! - **Garbage collection** ([`gc`]) removes cached versions that neither the
//!   current nor the previous channel mapping refers to.
//!
//! Each long-running command runs as a worker task that reports through the
//! event bus ([`events`]); a single consumer renders the events and decides
//! whether the command succeeded.
//!
//! # Storage layout
//!
//! ```text
//! ~/.multiwerf/
//! ├── 1.1.3/
//! │   ├── werf-linux-amd64-v1.1.3
//! │   └── SHA256SUMS
//! ├── channel_mapping.json
//! ├── channel_mapping.json.old
//! ├── update.delay
//! ├── remote_channel_mapping.delay
//! ├── config.toml
//! └── .locks/
//! ```
//!
//! # Modules
//!
//! - [`version`] - semantic versions, groups, channels and the resolver
//! - [`channel_mapping`] - the group/channel/version document, local and remote
//! - [`repository`] - release backends (GitHub Releases, mirror directories)
//! - [`verification`] - SHA-256 checksum manifests
//! - [`storage`] - paths of the version cache
//! - [`lock`] - named cross-process file locks
//! - [`delay`] - marker files that throttle periodic checks
//! - [`self_update`] - the self-update engine
//! - [`gc`] - the garbage collector
//! - [`workflow`] - `update`, `use`, `bin-path` and `available-releases`
//! - [`events`] - progress events, the consumer loop and terminal rendering
//! - [`cli`], [`config`], [`core`], [`logging`], [`constants`], [`utils`]

pub mod channel_mapping;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod delay;
pub mod events;
pub mod gc;
pub mod lock;
pub mod logging;
pub mod repository;
pub mod self_update;
pub mod storage;
pub mod utils;
pub mod verification;
pub mod version;
pub mod workflow;
