//! # hashdrip Bot
//!
//! Host for the hashdrip economy: chat transports in, command dispatch,
//! replies out, operator notifications for withdrawals.
//!
//! ## Architecture
//!
//! ```text
//!  ChatTransport ──► Dispatcher ──► Economy ──► AccountStore
//!  (console,          (task per      │            (memory, json,
//!   telegram)  ◄────   message)      │             rocksdb)
//!                                    ▼
//!                              PayoutNotifier
//!                              (log, webhook, telegram)
//! ```

pub mod channels;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod notify;
pub mod runtime;

pub use channels::{ChatTransport, ConsoleTransport, IncomingMessage, Reply, TelegramTransport};
pub use commands::Command;
pub use config::BotConfig;
pub use dispatcher::Dispatcher;
pub use error::{BotError, ChannelError};
pub use notify::{build_notifier, TelegramOperatorNotifier, WebhookNotifier};
pub use runtime::{open_backend, BotRuntime};
