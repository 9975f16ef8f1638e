//! Configuration loader and validator for the Instagram→VK relay daemon.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub instagram: Instagram,
    pub vk: Vk,
    pub gcs: Gcs,
    pub database: Database,
    /// Seconds each worker sleeps between polling cycles.
    pub sleep_interval: u64,
    pub workers: Workers,
}

/// Instagram Graph API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instagram {
    pub access_token: String,
    pub account_id: String,
    pub api: String,
    /// 0 means "use the built-in default" (3).
    #[serde(default)]
    pub last_posts_count: usize,
    /// 0 means "use the built-in default" (5).
    #[serde(default)]
    pub last_stories_count: usize,
}

/// VK API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vk {
    pub access_token: String,
    pub owner_id: i64,
}

/// Staging bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gcs {
    pub bucket_name: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Database {
    pub url: String,
}

/// Worker enablement, one switch per (content-class, destination) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workers {
    pub vk: DestinationWorkers,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationWorkers {
    pub post: WorkerSwitch,
    pub story: WorkerSwitch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerSwitch {
    pub enabled: bool,
}

impl Config {
    /// Apply environment-variable token overrides. Environment wins over the
    /// file so deployments never have to write secrets into YAML.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("IG_TOKEN") {
            if !token.is_empty() {
                self.instagram.access_token = token;
            }
        }
        if let Ok(token) = std::env::var("VK_TOKEN") {
            if !token.is_empty() {
                self.vk.access_token = token;
            }
        }
        if let Ok(token) = std::env::var("GCS_TOKEN") {
            if !token.is_empty() {
                self.gcs.access_token = token;
            }
        }
    }
}

/// Load configuration from a YAML file, apply env overrides, and validate.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env_overrides();
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.instagram.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid("instagram.access_token must be non-empty"));
    }
    if cfg.instagram.account_id.trim().is_empty() {
        return Err(ConfigError::Invalid("instagram.account_id must be non-empty"));
    }
    if cfg.instagram.api.trim().is_empty() {
        return Err(ConfigError::Invalid("instagram.api must be non-empty"));
    }

    if cfg.vk.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid("vk.access_token must be non-empty"));
    }
    if cfg.vk.owner_id == 0 {
        return Err(ConfigError::Invalid("vk.owner_id must be non-zero"));
    }

    if cfg.gcs.bucket_name.trim().is_empty() {
        return Err(ConfigError::Invalid("gcs.bucket_name must be non-empty"));
    }
    if cfg.gcs.access_token.trim().is_empty() {
        return Err(ConfigError::Invalid("gcs.access_token must be non-empty"));
    }

    if cfg.database.url.trim().is_empty() {
        return Err(ConfigError::Invalid("database.url must be non-empty"));
    }
    if cfg.sleep_interval == 0 {
        return Err(ConfigError::Invalid("sleep_interval must be > 0"));
    }

    Ok(())
}

/// Example YAML document; also the fixture used by the config tests.
pub fn example() -> &'static str {
    r#"instagram:
  access_token: "META_GRAPH_TOKEN"
  account_id: "17800000000000000"
  api: "https://graph.instagram.com"
  last_posts_count: 3
  last_stories_count: 5

vk:
  access_token: "VK_SERVICE_TOKEN"
  owner_id: -210000000

gcs:
  bucket_name: "ig2vk-staging"
  access_token: "GCS_OAUTH_TOKEN"

database:
  url: "sqlite://./data/ig2vk.db"

sleep_interval: 300

workers:
  vk:
    post:
      enabled: true
    story:
      enabled: true
"#
}
