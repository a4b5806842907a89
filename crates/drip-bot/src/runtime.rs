//! Bot Runtime
//!
//! Wires storage, the economy and a notifier from [`BotConfig`], then serves
//! one chat transport until it closes or shutdown is requested. Every message
//! runs as its own task; ordering between accounts is not preserved, while
//! per-account consistency comes from the store's account locks.

use crate::channels::{ChatTransport, IncomingMessage};
use crate::config::{BotConfig, StorageBackend, StorageConfig};
use crate::dispatcher::Dispatcher;
use crate::error::BotError;
use crate::notify::build_notifier;
use drip_core::{Clock, SystemClock};
use drip_economics::Economy;
use drip_storage::{AccountBackend, AccountStore, JsonFileBackend, MemoryBackend};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Queue between the transport reader and the dispatch loop
const INBOX_CAPACITY: usize = 1000;

/// Pause after a failed receive before polling again
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Open the configured account backend
pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn AccountBackend>, BotError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryBackend::new())),
        StorageBackend::Json => Ok(Arc::new(JsonFileBackend::open(&config.path)?)),
        #[cfg(feature = "rocksdb")]
        StorageBackend::Rocksdb => Ok(Arc::new(drip_storage::RocksBackend::open(&config.path)?)),
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::Rocksdb => Err(BotError::ConfigError(
            "storage.backend = \"rocksdb\" needs a build with the rocksdb feature".into(),
        )),
    }
}

pub struct BotRuntime {
    dispatcher: Arc<Dispatcher>,
}

impl BotRuntime {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Build everything from configuration with the system clock
    pub fn from_config(config: &BotConfig) -> Result<Self, BotError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &BotConfig, clock: Arc<dyn Clock>) -> Result<Self, BotError> {
        let backend = open_backend(&config.storage)?;
        let store = Arc::new(AccountStore::new(backend, clock));
        let notifier = build_notifier(&config.notifier, &config.telegram)?;
        let economy = Arc::new(Economy::new(store, notifier, config.economics.clone()));

        info!(
            "Economy ready: {} accounts, {:?} storage, {:?} notifier",
            economy.store.len()?,
            config.storage.backend,
            config.notifier.kind
        );
        Ok(Self::new(Arc::new(Dispatcher::new(
            economy,
            config.telegram.bot_username.clone(),
        ))))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Serve `transport` until it is exhausted or `shutdown` resolves.
    /// In-flight commands are awaited before returning.
    pub async fn run<T, S>(&self, transport: Arc<T>, shutdown: S) -> Result<(), BotError>
    where
        T: ChatTransport + 'static,
        S: Future<Output = ()>,
    {
        info!("Serving commands over {}", transport.name());
        let (inbox_tx, mut inbox) = mpsc::channel(INBOX_CAPACITY);
        let reader = tokio::spawn(read_transport(transport.clone(), inbox_tx));

        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                message = inbox.recv() => {
                    let Some(message) = message else {
                        info!("Transport {} closed", transport.name());
                        break;
                    };
                    let dispatcher = self.dispatcher.clone();
                    let transport = transport.clone();
                    tasks.spawn(async move {
                        if let Some(reply) = dispatcher.handle(&message).await {
                            if let Err(e) = transport.send(reply).await {
                                warn!("Reply to {} not delivered: {}", message.account_id, e);
                            }
                        }
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Command task failed: {}", e);
                    }
                }
            }
        }

        reader.abort();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Command task failed: {}", e);
            }
        }
        Ok(())
    }
}

async fn read_transport<T: ChatTransport>(transport: Arc<T>, inbox: mpsc::Sender<IncomingMessage>) {
    loop {
        match transport.receive().await {
            Ok(Some(message)) => {
                if inbox.send(message).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!("Receive on {} failed: {}", transport.name(), e);
                tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
            }
        }
    }
}
