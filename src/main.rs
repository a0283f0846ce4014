//! Task Bot - Main Entry Point
//!
//! A Telegram bot that hands out paid micro-tasks and tracks user
//! balances.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use task_bot::commands::BotHandler;
use task_bot::config::{BotConfig, BotSettings, TelegramConfig};
use task_bot::runner::{BotRunner, RunnerMessage};
use task_bot::store::SqliteStore;
use task_bot::telegram::{SubscriptionChecker, TelegramBot};

/// Telegram bot that pays users for micro-tasks.
#[derive(Parser, Debug)]
#[command(name = "task_bot")]
#[command(about = "Hand out paid micro-tasks through a Telegram bot")]
#[command(version)]
struct Args {
    /// Path to the bot JSON configuration file.
    #[arg(short, long, default_value = "bot.json")]
    config: String,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Generate an example configuration file and exit.
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_config {
        return generate_example_config();
    }

    // Loaded before logging so RUST_LOG from the file applies
    let env_loaded = dotenvy::from_filename(&args.env_file);

    let settings = BotSettings::from_env_with_defaults();
    init_logging(args.log_level.as_deref().unwrap_or(&settings.log_level));

    if let Err(e) = env_loaded {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let bot_config = BotConfig::load_from_file(&args.config)
        .context("Failed to load bot configuration")?;
    bot_config
        .validate()
        .context("Bot configuration validation failed")?;

    info!(
        "Loaded configuration with {} administrator(s)",
        bot_config.admin_ids.len()
    );
    if bot_config.auto_approve {
        warn!("auto_approve is set but screenshots are always reviewed manually");
    }

    let store = SqliteStore::connect(&settings.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", settings.database_url))?;

    let bot = TelegramBot::main(&tg_config);
    bot.get_me()
        .await
        .context("Failed to authorize with the bot token")?;

    let checker = SubscriptionChecker::new(TelegramBot::checker(&tg_config));

    let messenger = Arc::new(bot.clone());
    let handler = Arc::new(BotHandler::new(
        store.clone(),
        Arc::new(bot_config),
        messenger,
        Arc::new(checker),
        &settings,
    ));

    let runner = BotRunner::new(bot, handler);
    let (runner_tx, runner_rx) = mpsc::channel::<RunnerMessage>(4);

    info!("Starting task bot...");
    let runner_handle = tokio::spawn(async move {
        runner.run(runner_rx).await;
    });

    info!("Bot is running. Use Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");

    let _ = runner_tx.send(RunnerMessage::Shutdown).await;
    let _ = runner_handle.await;
    store.close().await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Generates an example configuration file.
fn generate_example_config() -> Result<()> {
    let example = BotConfig::example();
    example.save_to_file("bot.example.json")?;

    println!("✓ Example configuration written to: bot.example.json");
    println!("\nTo use this bot:");
    println!("1. Copy bot.example.json to bot.json");
    println!("2. Put your Telegram user id into admin_ids and adjust the texts");
    println!("3. Create a .env file with BOT_TOKEN (and optionally CHECK_BOT_TOKEN)");
    println!("4. Run: task_bot");

    Ok(())
}
