use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const URL_ENV: &str = "LINKMIRROR_URL";
const TOKEN_ENV: &str = "LINKMIRROR_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Base URL of the Linkding instance, e.g. `https://links.example.com`.
    pub server_url: Option<String>,
    pub api_token: Option<String>,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: u32,

    #[serde(default = "default_retry_schedule")]
    pub retry_schedule_secs: Vec<u64>,

    #[serde(default = "default_true")]
    pub cache_assets: bool,

    #[serde(default = "default_true")]
    pub push_read_status: bool,

    #[serde(default = "default_yield_every")]
    pub yield_every: usize,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linkmirror");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("bookmarks.db").to_string_lossy().to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_sync_interval() -> u32 {
    15
}

fn default_retry_schedule() -> Vec<u64> {
    vec![5, 15, 60, 300]
}

fn default_true() -> bool {
    true
}

fn default_yield_every() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            server_url: None,
            api_token: None,
            page_size: default_page_size(),
            sync_interval_minutes: default_sync_interval(),
            retry_schedule_secs: default_retry_schedule(),
            cache_assets: true,
            push_read_status: true,
            yield_every: default_yield_every(),
        }
    }
}

impl Config {
    /// Load the config file (writing defaults if it does not exist yet) and apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };
        config.apply_overrides(
            std::env::var(URL_ENV).ok(),
            std::env::var(TOKEN_ENV).ok(),
        );
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkmirror")
            .join("config.toml")
    }

    fn apply_overrides(&mut self, server_url: Option<String>, api_token: Option<String>) {
        if let Some(url) = server_url.filter(|s| !s.trim().is_empty()) {
            self.server_url = Some(url);
        }
        if let Some(token) = api_token.filter(|s| !s.trim().is_empty()) {
            self.api_token = Some(token);
        }
    }

    /// Server URL and token, or a configuration error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .server_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "server_url is not set (edit {} or set {})",
                    Self::config_path().display(),
                    URL_ENV
                ))
            })?;
        let token = self
            .api_token
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "api_token is not set (edit {} or set {})",
                    Self::config_path().display(),
                    TOKEN_ENV
                ))
            })?;
        Ok((url, token))
    }
}
