//! Configuration Module
//!
//! Handles application configuration loading, validation, and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Report storage locations (ledger snapshot, uploads, WhatsApp session)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Messaging channel integrations
    #[serde(default)]
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the JSON ledger snapshot
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Directory for report photo uploads
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Directory for the WhatsApp multi-device session files
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            uploads_dir: default_uploads_dir(),
            session_dir: default_session_dir(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("disperkim-bot")
}

fn default_ledger_path() -> PathBuf {
    data_dir().join("laporan.json")
}

fn default_uploads_dir() -> PathBuf {
    data_dir().join("uploads")
}

fn default_session_dir() -> PathBuf {
    data_dir().join("session")
}

/// Messaging channel integrations configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Multi-device socket client (QR pairing, local ledger)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SocketConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// WhatsApp Business Cloud API webhook (remote spreadsheet ledger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Bind address (default: "127.0.0.1")
    #[serde(default = "default_webhook_bind")]
    pub bind: String,

    /// Listen port (default: 3000)
    #[serde(default = "default_webhook_port")]
    pub port: u16,

    /// Meta webhook verification secret (env: VERIFY_TOKEN)
    #[serde(default)]
    pub verify_token: String,

    /// Cloud API bearer token (env: WHATSAPP_TOKEN)
    #[serde(default)]
    pub access_token: String,

    /// Cloud API phone number id (env: PHONE_NUMBER_ID)
    #[serde(default)]
    pub phone_number_id: String,

    /// Graph API base URL, overridable in tests
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,

    /// Target spreadsheet id (env: GOOGLE_SHEET_ID)
    #[serde(default)]
    pub sheet_id: String,

    /// OAuth bearer token for the Sheets API (env: GOOGLE_SHEETS_TOKEN)
    #[serde(default)]
    pub sheets_token: String,

    /// Sheets API base URL, overridable in tests
    #[serde(default = "default_sheets_api_base")]
    pub sheets_api_base: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_webhook_bind(),
            port: default_webhook_port(),
            verify_token: String::new(),
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: default_graph_api_base(),
            sheet_id: String::new(),
            sheets_token: String::new(),
            sheets_api_base: default_sheets_api_base(),
        }
    }
}

fn default_webhook_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_port() -> u16 {
    3000
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v17.0".to_string()
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. Default values
    /// 2. System config: ~/.config/disperkim-bot/config.toml
    /// 3. Local config: ./disperkim.toml
    /// 4. Environment variables
    pub fn load() -> Result<Self> {
        tracing::debug!("Loading configuration...");

        let mut config = Self::default();

        if let Some(system_config_path) = Self::system_config_path()
            && system_config_path.exists()
        {
            tracing::debug!("Loading system config from: {:?}", system_config_path);
            config = Self::merge_from_file(config, &system_config_path)?;
        }

        let local_config_path = Self::local_config_path();
        if local_config_path.exists() {
            tracing::debug!("Loading local config from: {:?}", local_config_path);
            config = Self::merge_from_file(config, &local_config_path)?;
        }

        config = Self::apply_env_overrides(config);

        tracing::debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading configuration from custom path: {:?}", path);

        let mut config = Self::default();
        if path.exists() {
            config = Self::merge_from_file(config, path)?;
        } else {
            anyhow::bail!("Config file not found: {:?}", path);
        }

        Ok(Self::apply_env_overrides(config))
    }

    /// Get the system config path: ~/.config/disperkim-bot/config.toml
    fn system_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("disperkim-bot").join("config.toml"))
    }

    /// Get the local config path: ./disperkim.toml
    fn local_config_path() -> PathBuf {
        PathBuf::from("./disperkim.toml")
    }

    /// Load and merge configuration from a TOML file
    fn merge_from_file(_base: Self, path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        // Overlay completely replaces base; per-field defaults fill the gaps.
        let file_config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(file_config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Self) -> Self {
        if let Ok(log_level) = std::env::var("DISPERKIM_LOG_LEVEL") {
            config.logging.level = log_level;
        }
        if let Ok(path) = std::env::var("DISPERKIM_LEDGER_PATH") {
            config.storage.ledger_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("DISPERKIM_UPLOADS_DIR") {
            config.storage.uploads_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DISPERKIM_SESSION_DIR") {
            config.storage.session_dir = PathBuf::from(dir);
        }

        // Cloud API secrets keep the env names the deployment already uses.
        if let Ok(token) = std::env::var("WHATSAPP_TOKEN") {
            config.channels.webhook.access_token = token;
        }
        if let Ok(id) = std::env::var("PHONE_NUMBER_ID") {
            config.channels.webhook.phone_number_id = id;
        }
        if let Ok(token) = std::env::var("VERIFY_TOKEN") {
            config.channels.webhook.verify_token = token;
        }
        if let Ok(id) = std::env::var("GOOGLE_SHEET_ID") {
            config.channels.webhook.sheet_id = id;
        }
        if let Ok(token) = std::env::var("GOOGLE_SHEETS_TOKEN") {
            config.channels.webhook.sheets_token = token;
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        tracing::debug!("Validating configuration...");

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        if self.channels.webhook.enabled {
            let wh = &self.channels.webhook;
            if wh.verify_token.is_empty() {
                anyhow::bail!("Webhook channel is enabled but verify_token is empty");
            }
            if wh.access_token.is_empty() {
                anyhow::bail!("Webhook channel is enabled but access_token is empty");
            }
            if wh.phone_number_id.is_empty() {
                anyhow::bail!("Webhook channel is enabled but phone_number_id is empty");
            }
            if wh.sheet_id.is_empty() {
                anyhow::bail!("Webhook channel is enabled but sheet_id is empty");
            }
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Configuration saved to: {:?}", path);
        Ok(())
    }
}
