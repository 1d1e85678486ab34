use std::sync::Arc;
use teloxide::types::UserId;

use crate::api::{DexScreenerClient, OpenAiClient};
use crate::config::Config;
use crate::solana::client::SolanaClient;
use crate::storage::WalletStore;
use crate::trading::TradeExecutor;

pub mod callbacks;
pub mod commands;
pub mod keyboards;
pub mod messages;
pub mod session;
pub mod views;

use session::SessionStore;

/// Everything the handlers share. Each store guards its own data.
pub struct BotState {
    pub config: Arc<Config>,
    pub wallets: WalletStore,
    pub sessions: SessionStore,
    pub dexscreener: DexScreenerClient,
    pub openai: Option<OpenAiClient>, // None when no API key is configured
    pub solana: Arc<SolanaClient>,
    pub executor: TradeExecutor,
}

impl BotState {
    pub fn is_authorized(&self, user_id: Option<UserId>) -> bool {
        match user_id {
            Some(id) => self.config.is_authorized(id.0 as i64),
            None => false,
        }
    }
}

/// Wallet store key for a Telegram user.
pub(crate) fn wallet_owner(user_id: UserId) -> String {
    user_id.0.to_string()
}
