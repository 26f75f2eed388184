//! Runtime configuration.
//!
//! Values come from a TOML file, then environment variables, then CLI flags
//! (applied by the binary).

use std::path::{Path, PathBuf};

use anyhow::Context;
use plugin_health_state::{CloudConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::probes::engine::DEFAULT_MAX_CONCURRENT;

/// Project-local config file name.
pub const CONFIG_FILENAME: &str = "plugin-health.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub update_center_url: String,
    pub documentation_url: String,
    pub github_api_url: String,
    #[serde(skip_serializing)]
    pub github_token: Option<String>,
    pub max_concurrent: usize,
    /// Parent of the per-plugin scratch directories. System temp when unset.
    pub work_dir: Option<PathBuf>,
    /// Any SurrealDB URL (`mem://`, `surrealkv://...`, `ws://...`).
    pub database_url: Option<String>,
    /// Local surrealkv directory, used when no URL is configured.
    pub database_path: Option<PathBuf>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            update_center_url: "https://updates.jenkins.io/current/update-center.actual.json"
                .to_string(),
            documentation_url: "https://updates.jenkins.io/plugin-documentation-urls.json"
                .to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_token: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            work_dir: None,
            database_url: None,
            database_path: None,
        }
    }
}

impl HealthConfig {
    /// Load `path`, or `./plugin-health.toml` when no path is given.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(CONFIG_FILENAME);
                if !default.exists() {
                    debug!("no config file found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        debug!(path = %path.display(), "loading config");
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Override file values from the process environment.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override file values through `lookup`, keyed by variable name.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("PLUGIN_HEALTH_UPDATE_CENTER_URL") {
            self.update_center_url = v;
        }
        if let Some(v) = lookup("PLUGIN_HEALTH_DOCUMENTATION_URL") {
            self.documentation_url = v;
        }
        if let Some(v) = lookup("PLUGIN_HEALTH_GITHUB_API_URL") {
            self.github_api_url = v;
        }
        if let Some(v) = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
            self.github_token = Some(v);
        }
        if let Some(v) = lookup("PLUGIN_HEALTH_MAX_CONCURRENT") {
            self.max_concurrent = v
                .parse()
                .with_context(|| format!("PLUGIN_HEALTH_MAX_CONCURRENT is not a number: {v}"))?;
        }
        if let Some(v) = lookup("PLUGIN_HEALTH_WORK_DIR") {
            self.work_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SURREALDB_URL") {
            self.database_url = Some(v);
        }
        Ok(())
    }

    /// Database selection: remote credentials from the environment first,
    /// then the configured URL, then the configured local path.
    pub fn store_config(&self) -> StoreConfig {
        if let Ok(cloud) = CloudConfig::from_env() {
            return StoreConfig::Cloud(cloud);
        }
        self.store_config_without_credentials()
    }

    fn store_config_without_credentials(&self) -> StoreConfig {
        match (&self.database_url, &self.database_path) {
            (Some(url), _) if url == "mem://" => StoreConfig::Memory,
            (Some(url), _) => StoreConfig::Url(url.clone()),
            (None, Some(path)) => StoreConfig::Local(path.clone()),
            (None, None) => StoreConfig::default(),
        }
    }
}
