//! Global constants used throughout the multiwerf codebase.
//!
//! This module contains timeout durations, retry parameters, file names and other
//! values that are used across multiple modules. Defining them centrally makes
//! magic numbers more discoverable.

use std::time::Duration;

/// Name of the managed program, used for binary names and the shell alias.
pub const PROGRAM_NAME: &str = "werf";

/// Name of this tool's own binary.
pub const SELF_NAME: &str = "multiwerf";

/// Checksum manifest file stored next to every downloaded binary.
pub const CHECKSUM_MANIFEST_FILE: &str = "SHA256SUMS";

/// Logical name of the program file in a download request.
pub const PROGRAM_FILE_KEY: &str = "program";

/// Logical name of the checksum manifest in a download request.
pub const MANIFEST_FILE_KEY: &str = "manifest";

/// Current channel mapping document inside the storage directory.
pub const CHANNEL_MAPPING_FILE: &str = "channel_mapping.json";

/// Suffix of the previous-generation channel mapping backup.
pub const BACKUP_SUFFIX: &str = ".old";

/// Marker file throttling self-update checks.
pub const SELF_UPDATE_DELAY_FILE: &str = "update.delay";

/// Marker file throttling remote channel mapping checks.
pub const REMOTE_MAPPING_DELAY_FILE: &str = "remote_channel_mapping.delay";

/// Directory holding named lock files.
pub const LOCKS_DIR: &str = ".locks";

/// Lock guarding binary replacement during self-update.
pub const SELF_UPDATE_LOCK: &str = "self-update";

/// Lock guarding structural changes to the version cache.
pub const GC_LOCK: &str = "gc";

/// Default remote channel mapping document.
pub const DEFAULT_CHANNEL_MAPPING_URL: &str =
    "https://raw.githubusercontent.com/werf/werf/multiwerf/multiwerf.json";

/// Default GitHub repository hosting the managed program releases.
pub const DEFAULT_PROGRAM_REPOSITORY: &str = "werf/werf";

/// Default GitHub repository hosting this tool's releases.
pub const DEFAULT_SELF_REPOSITORY: &str = "werf/multiwerf";

/// Default interval between self-update checks (2 hours).
pub const DEFAULT_SELF_UPDATE_DELAY: Duration = Duration::from_secs(2 * 60 * 60);

/// Default interval between remote channel mapping checks (30 minutes).
pub const DEFAULT_REMOTE_MAPPING_DELAY: Duration = Duration::from_secs(30 * 60);

/// Timeout for metadata requests: version listings, manifests, mappings.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a complete binary download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// How long the download path waits for the cache lock before giving up.
pub const CACHE_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum backoff delay for exponential backoff (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Number of retries for version listing requests.
pub const LIST_VERSIONS_RETRIES: usize = 2;

/// Flag appended to the relaunched process so it does not self-update again.
pub const SELF_UPDATE_DISABLED_FLAG: &str = "--self-update=no";
