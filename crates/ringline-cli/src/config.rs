//! Configuration management for Ringline CLI
//!
//! Stores API key, base URL and the default account in
//! ~/.config/ringline/config.toml. `RINGLINE_*` environment variables (also
//! read from a `.env` file) override the stored values for one invocation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR: &str = "ringline";
const CONFIG_FILE: &str = "config.toml";

pub const ENV_API_KEY: &str = "RINGLINE_API_KEY";
pub const ENV_BASE_URL: &str = "RINGLINE_BASE_URL";
pub const ENV_ACCOUNT: &str = "RINGLINE_ACCOUNT";

/// CLI Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_account: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_account: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join(CONFIG_DIR);
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load the stored config (or defaults) without environment overrides
    pub fn load_stored() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        toml::from_str(&content).with_context(|| "Failed to parse config file")
    }

    /// Stored config with `RINGLINE_*` overrides applied
    pub fn load() -> Result<Self> {
        let mut config = Self::load_stored()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {:?}", dir))?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(account) = get(ENV_ACCOUNT) {
            self.default_account = Some(account);
        }
    }

    /// Set API key
    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    /// Account to act on: the explicit one, else the default
    pub fn account_id(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(|s| s.to_string())
            .or_else(|| self.default_account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_file() {
        let config: Config = toml::from_str("api_key = \"rk_test\"\n").unwrap();
        assert_eq!(config.api_key.as_deref(), Some("rk_test"));
        assert_eq!(config.base_url, "http://localhost:8000");
        assert!(config.default_account.is_none());
    }

    #[test]
    fn test_env_overrides_stored_values() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://ringline.example.com"),
            (ENV_ACCOUNT, "6f9c2a1e-0000-4000-8000-000000000001"),
            (ENV_API_KEY, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            api_key: Some("stored".to_string()),
            ..Config::default()
        };
        config.apply_overrides(|key: &str| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("stored"));
        assert_eq!(config.base_url, "https://ringline.example.com");
        assert_eq!(
            config.account_id(None).as_deref(),
            Some("6f9c2a1e-0000-4000-8000-000000000001")
        );
        assert_eq!(config.account_id(Some("other")).as_deref(), Some("other"));
    }
}
