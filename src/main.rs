use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod bot;
mod config;
mod error;
mod models;
mod solana;
mod storage;
mod trading;

use crate::api::{DexScreenerClient, JupiterClient, OpenAiClient, RetryPolicy};
use crate::bot::session::SessionStore;
use crate::config::Config;
use crate::solana::client::SolanaClient;
use crate::storage::WalletStore;
use crate::trading::TradeExecutor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load environment variables
    dotenv().ok();

    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");
    if config.demo_mode {
        info!("🧪 DEMO mode: swaps are simulated and never sent");
    }

    let solana = Arc::new(SolanaClient::new(&config.solana_rpc_url));
    solana.health_check().await;

    let jupiter = Arc::new(JupiterClient::new(&config.jupiter_api_url, config.jupiter_api_key.clone())?);
    let dexscreener = DexScreenerClient::new(
        &config.dexscreener_api_url,
        RetryPolicy::with_attempts(config.dexscreener_retries),
    )?;
    let openai = match &config.openai_api_key {
        Some(key) => Some(OpenAiClient::new(
            &config.openai_api_url,
            key,
            &config.openai_model,
            config.openai_max_tokens,
        )?),
        None => {
            warn!("OPENAI_API_KEY not set, AI chat mode is disabled");
            None
        }
    };

    let wallets = WalletStore::new(&config.wallets_file);
    wallets.load().await.context("Failed to load wallet file")?;
    info!("Wallet store: {:?}", wallets.path());

    let executor = TradeExecutor::new(jupiter, solana.clone(), &config);

    let state = Arc::new(bot::BotState {
        config: config.clone(),
        wallets,
        sessions: SessionStore::new(),
        dexscreener,
        openai,
        solana,
        executor,
    });

    if config.authorized_users.is_empty() {
        warn!("TELEGRAM_ALLOWED_USERS is empty, the bot answers everyone");
    }

    let bot = Bot::new(&config.telegram_bot_token);
    info!("Starting bot...");
    bot::commands::start_bot(bot, state.clone()).await?;

    info!("Bot stopped, flushing wallet store");
    state.wallets.save().await?;
    Ok(())
}
