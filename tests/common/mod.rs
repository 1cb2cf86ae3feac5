//! Shared helpers for the integration tests.
//!
//! A [`TestStorage`] is a throwaway multiwerf installation: a storage directory,
//! a release mirror for werf, a remote channel mapping served from a file and a
//! `config.toml` wiring them together.

#![allow(dead_code)]

use anyhow::Result;
use multiwerf::channel_mapping::ChannelMapping;
use multiwerf::storage::{Storage, release_file_name};
use multiwerf::verification::compute_sha256;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;

pub struct TestStorage {
    _temp: TempDir,
    pub storage_dir: PathBuf,
    pub mirror: PathBuf,
    pub remote_mapping: PathBuf,
}

impl TestStorage {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let storage_dir = temp.path().join("storage");
        let mirror = temp.path().join("mirror");
        std::fs::create_dir_all(&storage_dir)?;
        std::fs::create_dir_all(&mirror)?;

        let config = format!(
            "[[repositories]]\ntype = \"mirror\"\npath = \"{}\"\n\n\
             [[self_repositories]]\ntype = \"mirror\"\npath = \"{}\"\n",
            toml_path(&mirror),
            toml_path(&temp.path().join("self-mirror")),
        );
        std::fs::write(storage_dir.join("config.toml"), config)?;

        Ok(Self {
            remote_mapping: temp.path().join("remote_channel_mapping.json"),
            _temp: temp,
            storage_dir,
            mirror,
        })
    }

    pub fn storage(&self) -> Storage {
        Storage::new(&self.storage_dir, "werf")
    }

    /// Publish a fake werf `version` with a matching checksum manifest.
    pub async fn publish(&self, version: &str) -> Result<()> {
        let dir = self.mirror.join(version);
        std::fs::create_dir_all(&dir)?;
        let file_name = release_file_name("werf", version);
        let binary = dir.join(&file_name);
        std::fs::write(&binary, format!("werf {version}"))?;
        let digest = compute_sha256(&binary).await?;
        std::fs::write(dir.join("SHA256SUMS"), format!("{digest}  {file_name}\n"))?;
        Ok(())
    }

    /// Replace the remote channel mapping.
    pub fn set_remote_mapping(&self, entries: &[(&str, &str, &str)]) -> Result<()> {
        let mut mapping = ChannelMapping::empty();
        for (group, channel, version) in entries {
            mapping.set_channel_version(group, channel, version);
        }
        std::fs::write(&self.remote_mapping, mapping.to_canonical_json()?)?;
        Ok(())
    }

    pub fn mapping_url(&self) -> String {
        format!("file://{}", self.remote_mapping.display().to_string().replace('\\', "/"))
    }

    /// A multiwerf command isolated to this storage, with self-update off.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::new(env!("CARGO_BIN_EXE_multiwerf"));
        for var in [
            "MULTIWERF_STORAGE_DIR",
            "MULTIWERF_SELF_UPDATE",
            "MULTIWERF_EXPERIMENTAL",
            "MULTIWERF_CHANNEL_MAPPING_URL",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd.env("MULTIWERF_STORAGE_DIR", &self.storage_dir)
            .env("MULTIWERF_CHANNEL_MAPPING_URL", self.mapping_url())
            .arg("--self-update=no")
            .arg("--no-progress");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("failed to run multiwerf")
    }
}

fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
