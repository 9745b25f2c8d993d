use std::path::{Path, PathBuf};

use anyhow::Context;
use revfs_merge::MergeConfig;
use serde::{Deserialize, Serialize};

/// Settings read from `revfs.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub merge: MergeConfig,
}

impl CliConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load `explicit` if given (it must exist), else `revfs.toml` beside
    /// the archive if present, else defaults.
    pub fn load(explicit: Option<&Path>, archive: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let beside = default_path(archive);
                if !beside.exists() {
                    return Ok(Self::default());
                }
                beside
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

fn default_path(archive: &Path) -> PathBuf {
    archive
        .parent()
        .map(|dir| dir.join("revfs.toml"))
        .unwrap_or_else(|| PathBuf::from("revfs.toml"))
}
