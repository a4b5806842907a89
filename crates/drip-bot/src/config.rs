//! Bot configuration types

use crate::error::BotError;
use drip_economics::EconomicsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment overrides, e.g. `HASHDRIP_TELEGRAM__TOKEN`
pub const ENV_PREFIX: &str = "HASHDRIP";

/// Complete bot configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Reward and withdrawal parameters
    #[serde(default)]
    pub economics: EconomicsConfig,

    /// Account store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Operator payout notifications
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BotConfig {
    /// Layer an optional TOML file and `HASHDRIP_*` environment variables
    /// over the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, BotError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Render as TOML, as printed by `hashdrip config`
    pub fn to_toml(&self) -> Result<String, BotError> {
        toml::to_string_pretty(self).map_err(|e| BotError::ConfigError(e.to_string()))
    }
}

/// Account store backend
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory, lost on exit
    Memory,
    /// Single JSON document, rewritten atomically on every save
    #[default]
    Json,
    /// RocksDB column store (requires the `rocksdb` feature)
    Rocksdb,
}

/// Storage settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// File (json) or directory (rocksdb) path
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "./data/accounts.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

/// Telegram Bot API settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramConfig {
    /// Bot token; required by the telegram transport and notifier
    #[serde(default)]
    pub token: Option<String>,

    /// Username used in invite links
    #[serde(default = "default_bot_username")]
    pub bot_username: String,

    /// Bot API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_bot_username() -> String {
    "hashdrip_bot".to_string()
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            bot_username: default_bot_username(),
            api_url: default_api_url(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Where payout requests go
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Log,
    Webhook,
    Telegram,
}

/// Operator notification settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifierConfig {
    #[serde(default)]
    pub kind: NotifierKind,

    /// Target of the webhook notifier
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Chat receiving payout requests from the telegram notifier
    #[serde(default)]
    pub operator_chat_id: Option<i64>,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
