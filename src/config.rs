use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for bayou-relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Directory holding the session and durable store files
    #[serde(default = "defaults::default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Remote API spec id this relay serves, logged at startup
    #[serde(default)]
    pub api_spec_id: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            storage_dir: defaults::default_storage_dir(),
            api_spec_id: String::new(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from the config file (if present) and environment
    /// variable overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Ok(config_path) if config_path.exists() => {
                tracing::debug!("loading bayou-relay config from {:?}", config_path);
                Self::load_from_file(&config_path)?
            }
            _ => Self::default(),
        };

        if let Ok(dir) = env::var("BAYOU_RELAY_STORAGE_DIR") {
            config.storage_dir = expand_tilde(&PathBuf::from(dir));
        }

        if let Ok(spec_id) = env::var("BAYOU_RELAY_API_SPEC_ID") {
            config.api_spec_id = spec_id;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: RelayConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.storage_dir = expand_tilde(&config.storage_dir);

        Ok(config)
    }

    /// Save configuration to file
    #[allow(dead_code)]
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/bayou-relay/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    /// Get storage directory, creating it if necessary
    pub fn ensure_storage_dir(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.storage_dir).with_context(|| {
            format!("Failed to create storage directory: {:?}", self.storage_dir)
        })?;
        Ok(self.storage_dir.clone())
    }
}

mod defaults {
    use std::path::PathBuf;

    pub(crate) fn default_storage_dir() -> PathBuf {
        dirs::data_dir()
            .map(|data| data.join("bayou-relay"))
            .unwrap_or_else(|| PathBuf::from(".bayou-relay"))
    }
}
