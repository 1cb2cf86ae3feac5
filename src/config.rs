//! Runtime configuration.
//!
//! A [`Config`] is assembled once at startup and passed by reference from then
//! on. Sources are layered, later ones winning:
//!
//! 1. built-in defaults from [`crate::constants`]
//! 2. `config.toml` in the storage directory, or the file given with `--config`
//! 3. environment variables (`MULTIWERF_STORAGE_DIR`, `MULTIWERF_SELF_UPDATE`,
//!    `MULTIWERF_EXPERIMENTAL`, `MULTIWERF_CHANNEL_MAPPING_URL`)
//! 4. command-line flags
//!
//! Environment variables reach [`Overrides`] through clap, so layers 3 and 4
//! arrive together.
//!
//! # File format
//!
//! ```toml
//! channel_mapping_url = "https://example.com/multiwerf/channel_mapping.json"
//! self_update = true
//! self_update_delay_secs = 7200
//! remote_mapping_delay_secs = 1800
//! channels = ["alpha", "beta", "ea", "rc", "stable"]
//!
//! [[repositories]]
//! type = "mirror"
//! path = "/srv/mirror/werf"
//!
//! [[repositories]]
//! type = "github"
//! repo = "werf/werf"
//!
//! [[self_repositories]]
//! type = "github"
//! repo = "werf/multiwerf"
//! ```
//!
//! Every key is optional. An empty repository list means the default GitHub
//! project.

use crate::constants::{
    DEFAULT_CHANNEL_MAPPING_URL, DEFAULT_PROGRAM_REPOSITORY, DEFAULT_REMOTE_MAPPING_DELAY,
    DEFAULT_SELF_REPOSITORY, DEFAULT_SELF_UPDATE_DELAY, PROGRAM_NAME, SELF_NAME,
};
use crate::repository::github::{DEFAULT_API_URL, DEFAULT_DOWNLOAD_URL};
use crate::repository::{GitHubRepository, LocalRepository, Repository};
use crate::storage::Storage;
use crate::version::ChannelOrder;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Name of the configuration file inside the storage directory.
pub const CONFIG_FILE: &str = "config.toml";

/// One release source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepositoryConfig {
    /// Releases of a GitHub project, `owner/name`.
    Github {
        repo: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        download_url: Option<String>,
    },
    /// A directory laid out as `<version>/<release file>`.
    Mirror { path: String },
}

impl RepositoryConfig {
    pub fn github(repo: &str) -> Self {
        Self::Github {
            repo: repo.to_string(),
            api_url: None,
            download_url: None,
        }
    }

    /// Instantiate the backend.
    pub fn build(&self) -> Result<Arc<dyn Repository>> {
        match self {
            Self::Github {
                repo,
                api_url,
                download_url,
            } => {
                let repository = GitHubRepository::with_base_urls(
                    repo,
                    api_url.as_deref().unwrap_or(DEFAULT_API_URL),
                    download_url.as_deref().unwrap_or(DEFAULT_DOWNLOAD_URL),
                )?;
                Ok(Arc::new(repository))
            }
            Self::Mirror { path } => Ok(Arc::new(LocalRepository::new(expand_path(path)?))),
        }
    }
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_mapping_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_update: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_update_delay_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_mapping_delay_secs: Option<u64>,

    /// Channel names from lowest to highest priority; must end with `stable`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,

    /// Backends for the managed program, tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryConfig>,

    /// Backends for multiwerf's own releases, tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub self_repositories: Vec<RepositoryConfig>,
}

impl FileConfig {
    /// Load the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load `path` if it exists, otherwise an empty configuration.
    pub async fn load_optional(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from(path).await
        } else {
            debug!("No config file at {}", path.display());
            Ok(Self::default())
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub storage_dir: Option<String>,
    pub channel_mapping_url: Option<String>,
    pub self_update: Option<bool>,
    pub experimental: Option<bool>,
    pub verbose: bool,
    pub quiet: bool,
    pub no_progress: bool,
}

/// Effective configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub channel_mapping_url: String,
    pub self_update: bool,
    pub experimental: bool,
    pub self_update_delay: Duration,
    pub remote_mapping_delay: Duration,
    pub channels: ChannelOrder,
    pub repositories: Vec<RepositoryConfig>,
    pub self_repositories: Vec<RepositoryConfig>,
    pub verbose: bool,
    pub quiet: bool,
    pub no_progress: bool,
}

impl Config {
    /// Configuration rooted at `storage_dir` with every other value defaulted.
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            channel_mapping_url: DEFAULT_CHANNEL_MAPPING_URL.to_string(),
            self_update: true,
            experimental: false,
            self_update_delay: DEFAULT_SELF_UPDATE_DELAY,
            remote_mapping_delay: DEFAULT_REMOTE_MAPPING_DELAY,
            channels: ChannelOrder::default(),
            repositories: vec![RepositoryConfig::github(DEFAULT_PROGRAM_REPOSITORY)],
            self_repositories: vec![RepositoryConfig::github(DEFAULT_SELF_REPOSITORY)],
            verbose: false,
            quiet: false,
            no_progress: false,
        }
    }

    /// Build the configuration from every layer.
    ///
    /// # Errors
    ///
    /// Fails when the home directory cannot be determined, the config file
    /// is unreadable or malformed, or its channel list is invalid.
    pub async fn resolve(overrides: Overrides) -> Result<Self> {
        let storage_dir = match &overrides.storage_dir {
            Some(dir) => expand_path(dir)?,
            None => default_storage_dir()?,
        };

        let config_path = match &overrides.config_path {
            Some(path) => path.clone(),
            None => storage_dir.join(CONFIG_FILE),
        };
        let file = if overrides.config_path.is_some() {
            FileConfig::load_from(&config_path).await?
        } else {
            FileConfig::load_optional(&config_path).await?
        };

        let mut config = Self::with_storage_dir(storage_dir);
        config.apply_file(file).with_context(|| {
            format!("Invalid configuration in {}", config_path.display())
        })?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<()> {
        if let Some(url) = file.channel_mapping_url {
            self.channel_mapping_url = url;
        }
        if let Some(self_update) = file.self_update {
            self.self_update = self_update;
        }
        if let Some(experimental) = file.experimental {
            self.experimental = experimental;
        }
        if let Some(secs) = file.self_update_delay_secs {
            self.self_update_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = file.remote_mapping_delay_secs {
            self.remote_mapping_delay = Duration::from_secs(secs);
        }
        if let Some(channels) = file.channels {
            self.channels = ChannelOrder::new(channels)?;
        }
        if !file.repositories.is_empty() {
            self.repositories = file.repositories;
        }
        if !file.self_repositories.is_empty() {
            self.self_repositories = file.self_repositories;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.channel_mapping_url {
            self.channel_mapping_url = url;
        }
        if let Some(self_update) = overrides.self_update {
            self.self_update = self_update;
        }
        if let Some(experimental) = overrides.experimental {
            self.experimental = experimental;
        }
        self.verbose = overrides.verbose;
        self.quiet = overrides.quiet;
        self.no_progress = overrides.no_progress;
    }

    /// Storage for the managed program's versions.
    pub fn storage(&self) -> Storage {
        Storage::new(&self.storage_dir, PROGRAM_NAME)
    }

    /// Backends for the managed program.
    pub fn program_backends(&self) -> Result<Vec<Arc<dyn Repository>>> {
        build_all(&self.repositories).context("Failed to set up release backends")
    }

    /// Backends for multiwerf itself.
    pub fn self_backends(&self) -> Result<Vec<Arc<dyn Repository>>> {
        build_all(&self.self_repositories)
            .with_context(|| format!("Failed to set up {SELF_NAME} update backends"))
    }
}

fn build_all(configs: &[RepositoryConfig]) -> Result<Vec<Arc<dyn Repository>>> {
    configs.iter().map(RepositoryConfig::build).collect()
}

/// `~/.multiwerf`.
pub fn default_storage_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
    Ok(home.join(format!(".{SELF_NAME}")))
}

/// Expand a leading `~` and environment variables.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
