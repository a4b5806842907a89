//! Chat Channels
//!
//! Transports that deliver user commands in and replies out. The dispatcher
//! only sees [`ChatTransport`]; platform details stay in the adapters.

mod console;
mod telegram;

pub use console::*;
pub use telegram::*;

use crate::error::ChannelError;
use async_trait::async_trait;
use drip_core::AccountId;
use serde::{Deserialize, Serialize};

/// Text message from a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Sender, also the account key
    pub account_id: AccountId,

    /// Raw message text
    pub text: String,
}

impl IncomingMessage {
    pub fn new(account_id: AccountId, text: impl Into<String>) -> Self {
        Self {
            account_id,
            text: text.into(),
        }
    }
}

/// Reply addressed to the sender of a command
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub account_id: AccountId,
    pub text: String,
}

impl Reply {
    pub fn new(account_id: AccountId, text: impl Into<String>) -> Self {
        Self {
            account_id,
            text: text.into(),
        }
    }
}

/// Chat transport trait
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Wait for the next message; `None` once the transport is exhausted
    async fn receive(&self) -> Result<Option<IncomingMessage>, ChannelError>;

    /// Deliver a reply
    async fn send(&self, reply: Reply) -> Result<(), ChannelError>;
}
