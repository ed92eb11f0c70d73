//! ScrumBot configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScrumError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrumBotConfig {
    /// Token the chat platform sends with every slash command request.
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub messenger: MessengerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

impl Default for ScrumBotConfig {
    fn default() -> Self {
        Self {
            app_token: String::new(),
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            messenger: MessengerConfig::default(),
            health: HealthConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl ScrumBotConfig {
    /// Load config from the default path (~/.scrumbot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScrumError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ScrumError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Apply environment overrides. `SCRUMBOT_APP_TOKEN` wins over the
    /// legacy `DOORAY_TOKEN`, which wins over the file value.
    pub fn with_env_overrides(mut self) -> Self {
        let token = std::env::var("SCRUMBOT_APP_TOKEN")
            .or_else(|_| std::env::var("DOORAY_TOKEN"))
            .ok()
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            self.app_token = token;
        }
        self
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the ScrumBot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".scrumbot")
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 8080 }
fn default_host() -> String { "0.0.0.0".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// SQLite datastore configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.scrumbot/scrumbot.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

/// Clock driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// How often the clock is sampled. Meetings only fire on second 0, so
    /// this must stay well under a second's worth of drift.
    #[serde(default = "default_check_interval")]
    pub check_interval_ms: u64,
}

fn bool_true() -> bool { true }
fn default_check_interval() -> u64 { 1000 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: default_check_interval(),
        }
    }
}

/// Outbound messenger API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Scheme used to reach `https://{tenantDomain}/messenger/api`.
    #[serde(default = "default_scheme")]
    pub api_scheme: String,
}

fn default_timeout() -> u64 { 10 }
fn default_scheme() -> String { "https".into() }

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            api_scheme: default_scheme(),
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// While this file exists the probe reports 503.
    #[serde(default = "default_maintenance_file")]
    pub maintenance_file: String,
}

fn default_maintenance_file() -> String { "./maintenance".into() }

impl Default for HealthConfig {
    fn default() -> Self {
        Self { maintenance_file: default_maintenance_file() }
    }
}

/// Short-lived server-side sessions (setup submissions awaiting a master).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_setup_ttl")]
    pub setup_ttl_secs: u64,
}

fn default_setup_ttl() -> u64 { 600 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self { setup_ttl_secs: default_setup_ttl() }
    }
}
