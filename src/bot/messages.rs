use solana_sdk::signer::Signer;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId};
use tracing::{error, info, warn};

use crate::api::dexscreener::format_token_info;
use crate::api::openai::extract_token_address;
use crate::bot::session::{Mode, SessionStore};
use crate::bot::{keyboards, views, wallet_owner, BotState};
use crate::solana::wallet::WalletRecord;
use crate::storage::WalletStore;
use crate::trading::flow::{StepOutcome, TradeOrder};

/// What a free-text message from a user should trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Route<'a> {
    Chat(&'a str),
    TokenLookup(&'a str),
    InvalidTokenAddress,
    TradeInput(&'a str),
}

/// Chooses the handler for free text in `mode`. Token lookups need an
/// address of at least 32 characters.
pub fn route(mode: Mode, text: &str) -> Route<'_> {
    match mode {
        Mode::Chat => Route::Chat(text),
        Mode::Token => {
            let address = text.trim();
            if address.len() < 32 {
                Route::InvalidTokenAddress
            } else {
                Route::TokenLookup(address)
            }
        }
        Mode::Wallet => Route::TradeInput(text),
    }
}

/// Result of feeding one message into the user's trade flow.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeReply {
    NeedWallet,
    SelectActionFirst,
    Prompt(String),
    Execute(TradeOrder),
    /// Reply text for rejected input. The flow is already cleared.
    Rejected(String),
}

/// Advances the pending trade of `user`. The next step is stored again only
/// when the input was accepted and more input is needed.
pub async fn advance_trade(sessions: &SessionStore, wallets: &WalletStore, user: UserId, text: &str) -> TradeReply {
    if !wallets.has_wallet(&wallet_owner(user)).await {
        return TradeReply::NeedWallet;
    }

    let user_key = user.0 as i64;
    let step = match sessions.take_trade(user_key).await {
        Some(step) => step,
        None => return TradeReply::SelectActionFirst,
    };

    match step.advance(text) {
        Ok(StepOutcome::Next { step, prompt }) => {
            sessions.set_trade(user_key, step).await;
            TradeReply::Prompt(prompt)
        }
        Ok(StepOutcome::Ready(order)) => TradeReply::Execute(order),
        Err(e) => {
            warn!("Trade input from user {} rejected: {}", user, e);
            TradeReply::Rejected(format!("Error: {}", e))
        }
    }
}

/// Wallet that trades for `user`: the selected one when it still exists,
/// otherwise the first.
pub async fn trading_wallet(sessions: &SessionStore, wallets: &WalletStore, user: UserId) -> Option<WalletRecord> {
    let owner = wallet_owner(user);
    if let Some(index) = sessions.get(user.0 as i64).await.selected_wallet {
        if let Some(wallet) = wallets.get(&owner, index).await {
            return Some(wallet);
        }
    }
    wallets.first(&owner).await
}

/// Free text, routed by the user's current mode.
pub async fn message_handler(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let (text, user) = match (msg.text(), msg.from()) {
        (Some(text), Some(user)) => (text.to_string(), user.id),
        _ => return Ok(()),
    };

    if !state.is_authorized(Some(user)) {
        warn!("Unauthorized message from user: {}", user);
        bot.send_message(msg.chat.id, views::UNAUTHORIZED).await?;
        return Ok(());
    }

    let session = state.sessions.get(user.0 as i64).await;
    match route(session.mode, &text) {
        Route::Chat(text) => handle_chat(&bot, &msg, &state, text).await,
        Route::TokenLookup(address) => handle_token_lookup(&bot, &msg, &state, address).await,
        Route::InvalidTokenAddress => {
            bot.send_message(msg.chat.id, views::INVALID_TOKEN_ADDRESS).await?;
            Ok(())
        }
        Route::TradeInput(text) => handle_trade_input(&bot, &msg, &state, user, text).await,
    }
}

async fn handle_chat(bot: &Bot, msg: &Message, state: &BotState, text: &str) -> ResponseResult<()> {
    let openai = match &state.openai {
        Some(client) => client,
        None => {
            bot.send_message(msg.chat.id, views::CHAT_DISABLED).await?;
            return Ok(());
        }
    };

    let token_context = match extract_token_address(text) {
        Some(address) => {
            info!("Chat message mentions {}, fetching market data", address);
            state
                .dexscreener
                .get_token_info(&address)
                .await
                .map(|token_info| format_token_info(&token_info))
        }
        None => None,
    };

    let reply = openai.chat(text, token_context.as_deref()).await;
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_token_lookup(bot: &Bot, msg: &Message, state: &BotState, address: &str) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, views::FETCHING_TOKEN).await?;
    let report = token_report(state, address).await;
    bot.send_message(msg.chat.id, report).await?;
    Ok(())
}

/// Market summary plus honeypot verdict for `address`.
pub async fn token_report(state: &BotState, address: &str) -> String {
    match state.dexscreener.get_token_info(address).await {
        Some(token_info) => {
            let honeypot = state.dexscreener.check_honeypot(address).await;
            views::token_report(&format_token_info(&token_info), &honeypot)
        }
        None => views::TOKEN_NOT_FOUND.to_string(),
    }
}

async fn handle_trade_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user: UserId,
    text: &str,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    match advance_trade(&state.sessions, &state.wallets, user, text).await {
        TradeReply::NeedWallet => {
            bot.send_message(chat_id, views::NEED_WALLET).await?;
        }
        TradeReply::SelectActionFirst => {
            bot.send_message(chat_id, views::SELECT_ACTION_FIRST).await?;
        }
        TradeReply::Prompt(prompt) => {
            bot.send_message(chat_id, prompt)
                .reply_markup(keyboards::cancel_trade())
                .await?;
        }
        TradeReply::Execute(order) => execute_order(bot, chat_id, state, user, &order).await?,
        TradeReply::Rejected(reply) => {
            bot.send_message(chat_id, reply).await?;
        }
    }
    Ok(())
}

async fn execute_order(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    user: UserId,
    order: &TradeOrder,
) -> ResponseResult<()> {
    let token_data = match state.dexscreener.get_token_info(&order.info_token).await {
        Some(token_info) => format_token_info(&token_info),
        None => views::TOKEN_INFO_UNAVAILABLE.to_string(),
    };
    bot.send_message(chat_id, views::trade_preview(order, &token_data, state.executor.is_demo()))
        .await?;

    let keypair = match trading_wallet(&state.sessions, &state.wallets, user).await.map(|w| w.keypair()) {
        Some(Ok(keypair)) => keypair,
        Some(Err(e)) => {
            error!("Could not load keypair for user {}: {:#}", user, e);
            bot.send_message(chat_id, format!("Error: {}", e)).await?;
            return Ok(());
        }
        None => {
            bot.send_message(chat_id, views::NEED_WALLET).await?;
            return Ok(());
        }
    };

    if let Some(reason) = state.executor.pre_trade_check(order, &keypair.pubkey()).await {
        bot.send_message(chat_id, reason).await?;
        return Ok(());
    }

    match state.executor.execute(&keypair, order).await {
        Ok(outcome) => {
            info!("{} order for user {} done: {}", order.kind, user, outcome.signature);
            bot.send_message(chat_id, views::trade_success(order, &outcome)).await?;
        }
        Err(e) => {
            error!("{} order for user {} failed: {:#}", order.kind, user, e);
            bot.send_message(chat_id, order.failure_message()).await?;
        }
    }
    Ok(())
}
