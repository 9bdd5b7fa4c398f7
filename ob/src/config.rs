//! Offload breakdown configuration types and loading

use eyre::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend API configuration
    pub backend: BackendConfig,

    /// Whether breakdown requests may be sent to the cloud
    #[serde(rename = "cloud-ai-enabled")]
    pub cloud_ai_enabled: bool,

    /// Fixed install ID; generated and persisted in the data dir when unset
    #[serde(rename = "install-id")]
    pub install_id: Option<String>,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.backend.base_url)
            .map_err(|e| eyre::eyre!("Invalid backend base-url '{}': {}", self.backend.base_url, e))?;

        if self.backend.timeout_ms == 0 {
            return Err(eyre::eyre!("backend timeout-ms must be greater than zero"));
        }
        Ok(())
    }

    /// Config files searched when no explicit path is given, highest priority first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".offload.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("offload").join("offload.yml"));
        }
        paths
    }

    /// Load the explicit config, else the first readable search path, else defaults
    ///
    /// An explicit path must load. Unreadable search-path files are skipped with a warning.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_yaml_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let found = Self::search_paths().into_iter().filter(|p| p.is_file()).find_map(|path| {
            Self::from_yaml_file(&path)
                .inspect_err(|e| tracing::warn!(path = %path.display(), error = %e, "Config::load: skipping config"))
                .ok()
        });

        Ok(found.unwrap_or_else(|| {
            tracing::info!("Config::load: no config file found, using defaults");
            Self::default()
        }))
    }

    fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!(path = %path.display(), "Config::load: loaded");
        Ok(config)
    }

    /// Resolve the install ID: configured value, else the persisted one, else a new one
    pub fn resolve_install_id(&self) -> Result<String> {
        if let Some(id) = self.install_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return Ok(id.trim().to_string());
        }

        let path = self.storage.install_id_path();
        if path.exists() {
            let id = fs::read_to_string(&path).context("Failed to read install-id file")?;
            let id = id.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }

        let id = uuid::Uuid::now_v7().to_string();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        fs::write(&path, &id).context("Failed to write install-id file")?;
        tracing::info!("Generated install id at {}", path.display());
        Ok(id)
    }
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API base URL, may include a path prefix
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Platform reported when creating sessions
    pub platform: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.offload.app".to_string(),
            timeout_ms: 30_000,
            platform: "cli".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for usage counters and the install ID
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn usage_path(&self) -> PathBuf {
        self.data_dir.join("usage.json")
    }

    pub fn install_id_path(&self) -> PathBuf {
        self.data_dir.join("install-id")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/offload on Linux)
        let data_dir = dirs::data_dir()
            .map(|d| d.join("offload"))
            .unwrap_or_else(|| PathBuf::from(".offload"));

        Self { data_dir }
    }
}
