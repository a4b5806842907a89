//! Integration tests for the hashdrip bot host
//!
//! Drives the full runtime (console transport, dispatcher, economy, store)
//! with scripted input and inspects the rendered replies.

use drip_bot::config::{BotConfig, StorageBackend};
use drip_bot::{BotRuntime, ConsoleTransport};
use drip_core::{AccountId, ManualClock};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Writer whose buffer outlives the transport
#[derive(Clone, Default)]
struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl AsyncWrite for SharedOutput {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn memory_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config
}

async fn run_script(config: &BotConfig, script: &'static str) -> (BotRuntime, Vec<String>) {
    let runtime = BotRuntime::with_clock(config, Arc::new(ManualClock::at_epoch())).unwrap();
    let output = SharedOutput::default();
    let transport = Arc::new(ConsoleTransport::new(script.as_bytes(), output.clone()));

    runtime
        .run(transport, std::future::pending::<()>())
        .await
        .unwrap();

    let lines = output.lines();
    (runtime, lines)
}

/// Text of all replies addressed to `id`; untagged lines continue the
/// previous reply
fn replies_to(lines: &[String], id: i64) -> String {
    let mut current = None;
    let mut collected = Vec::new();
    for line in lines {
        if let Some(tagged) = line.strip_prefix('[') {
            if let Some((tag, _)) = tagged.split_once("] ") {
                current = tag.parse::<i64>().ok();
            }
        }
        if current == Some(id) {
            collected.push(line.as_str());
        }
    }
    collected.join("\n")
}

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_every_account_gets_its_own_reply() {
        let (runtime, lines) = run_script(
            &memory_config(),
            "1 /start\n\
             2 /start 1\n\
             3 /withdraw\n\
             4 0.49 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa\n\
             5 /moon\n\
             6 good morning everyone\n",
        )
        .await;

        assert!(replies_to(&lines, 1).contains("Welcome to hashdrip!"));
        assert!(replies_to(&lines, 2).contains("invite from 1"));
        assert!(replies_to(&lines, 3).contains("<amount> <address>"));
        assert!(replies_to(&lines, 4).contains("Minimum withdrawal is $0.50."));
        assert!(replies_to(&lines, 5).contains("Unknown command /moon"));
        assert!(replies_to(&lines, 6).is_empty());

        let store = &runtime.dispatcher().economy().store;
        let referee = store.get(AccountId::new(2)).unwrap().unwrap();
        assert_eq!(referee.referred_by(), Some(AccountId::new(1)));
        assert!(store.get(AccountId::new(6)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parallel_miners() {
        let script: &'static str = "10 /mine\n11 /mine\n12 /mine\n13 /mine\n";
        let (runtime, lines) = run_script(&memory_config(), script).await;

        for id in 10..14 {
            assert!(
                replies_to(&lines, id).contains("Mining started!"),
                "no start reply for {}",
                id
            );
        }
        let economy = runtime.dispatcher().economy();
        assert_eq!(
            economy.store.total_balance().unwrap(),
            economy.config.base_credit + economy.config.base_credit
                + economy.config.base_credit
                + economy.config.base_credit
        );
    }
}

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_json_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BotConfig::default();
        config.storage.backend = StorageBackend::Json;
        config.storage.path = dir
            .path()
            .join("accounts.json")
            .to_string_lossy()
            .into_owned();

        let (_, lines) = run_script(&config, "21 /start 20\n").await;
        assert!(replies_to(&lines, 21).contains("invite from 20"));

        let (runtime, lines) = run_script(&config, "20 /referstats\n").await;
        assert!(replies_to(&lines, 20).contains("Referrals: 1"));
        assert_eq!(runtime.dispatcher().economy().store.len().unwrap(), 2);
    }
}
