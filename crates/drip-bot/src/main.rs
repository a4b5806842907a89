//! hashdrip CLI
//!
//! Command-line entry point for running the mining reward bot.

use clap::{Parser, Subcommand, ValueEnum};
use drip_bot::config::LoggingConfig;
use drip_bot::{open_backend, BotConfig, BotRuntime, ConsoleTransport, TelegramTransport};
use drip_core::SystemClock;
use drip_economics::{FIAT_SIGN, SYMBOL};
use drip_storage::AccountStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "hashdrip")]
#[command(version)]
#[command(about = "hashdrip - mining reward chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML); HASHDRIP_* variables override it
    #[arg(short, long, global = true, env = "HASHDRIP_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run {
        /// Where commands come from
        #[arg(short, long, value_enum, default_value_t = TransportKind::Console)]
        transport: TransportKind,
    },

    /// Print the effective configuration
    Config,

    /// Show ledger totals
    Stats,

    /// Version information
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TransportKind {
    /// `<account_id> <text>` lines on stdin
    Console,
    /// Telegram Bot API long polling
    Telegram,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false),
            )
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BotConfig::load(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Run { transport } => {
            tracing::info!("hashdrip v{}", env!("CARGO_PKG_VERSION"));
            if let Some(path) = &cli.config {
                tracing::info!("Config: {:?}", path);
            }
            tracing::info!("Storage: {:?} at {}", config.storage.backend, config.storage.path);

            match transport {
                TransportKind::Console => {
                    let runtime = BotRuntime::from_config(&config)?;
                    println!("Type `<account_id> <command>`, e.g. `1 /start`. Ctrl-D to quit.");
                    runtime
                        .run(Arc::new(ConsoleTransport::stdio()), shutdown_signal())
                        .await?;
                }
                TransportKind::Telegram => {
                    let telegram = Arc::new(TelegramTransport::new(&config.telegram)?);
                    match telegram.username().await {
                        Ok(Some(username)) => config.telegram.bot_username = username,
                        Ok(None) => {}
                        Err(e) => tracing::warn!("getMe failed, keeping configured username: {}", e),
                    }
                    tracing::info!("Bot: @{}", config.telegram.bot_username);

                    let runtime = BotRuntime::from_config(&config)?;
                    runtime.run(telegram, shutdown_signal()).await?;
                }
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }

        Commands::Stats => {
            let backend = open_backend(&config.storage)?;
            let store = AccountStore::new(backend, Arc::new(SystemClock));
            let total = store.total_balance()?;
            let rate = config.economics.exchange_rate;

            println!("Storage: {:?} ({})", config.storage.backend, config.storage.path);
            println!("Accounts: {}", store.len()?);
            println!(
                "Total balance: {} {} (~{}{})",
                total,
                SYMBOL,
                FIAT_SIGN,
                rate.to_fiat(total).to_cents_string()
            );
            println!("Exchange rate: {}{} per {}", FIAT_SIGN, rate.fiat_per_coin(), SYMBOL);
        }

        Commands::Version => {
            println!("hashdrip v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Features:");
            println!("  - 8h mining sessions with ad boosts");
            println!("  - 10% referral bonus on referee credits");
            println!("  - Manual payouts with operator notification");
            println!(
                "  - Storage backends: memory, json{}",
                if cfg!(feature = "rocksdb") { ", rocksdb" } else { "" }
            );
        }
    }

    Ok(())
}
