//! Error types for the hashdrip bot host

use drip_core::DripError;
use drip_storage::StoreError;
use thiserror::Error;

/// Host-level errors: startup, configuration, transport
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(#[from] ChannelError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StoreError),

    #[error("Ledger error: {0}")]
    LedgerError(#[from] DripError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}

/// Chat transport errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Platform API error: {0}")]
    Api(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid credentials for channel: {0}")]
    InvalidCredentials(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        Self::ConnectionFailed(e.to_string())
    }
}
