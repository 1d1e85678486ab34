use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup};
use teloxide::{ApiError, RequestError};
use tracing::{debug, error, info, warn};

use crate::bot::keyboards::{self, CallbackAction};
use crate::bot::session::Mode;
use crate::bot::{views, wallet_owner, BotState};
use crate::trading::flow::{TradeKind, TradeStep};

pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let user = q.from.id;

    if !state.is_authorized(Some(user)) {
        warn!("Unauthorized callback query attempt by user: {}", user);
        bot.answer_callback_query(q.id.clone()).text("Unauthorized").await?;
        return Ok(());
    }

    let action = match q.data.as_deref().and_then(CallbackAction::parse) {
        Some(action) => action,
        None => {
            warn!("Unhandled callback data: {:?}", q.data);
            bot.answer_callback_query(q.id.clone()).text("⚠️ Unknown action").await?;
            return Ok(());
        }
    };
    info!("Callback {:?} from user: {}", action, user);
    bot.answer_callback_query(q.id.clone()).await?;

    let user_key = user.0 as i64;
    let owner = wallet_owner(user);

    match action {
        CallbackAction::ModeChat => {
            state.sessions.set_mode(user_key, Mode::Chat).await;
            show(&bot, &q, views::CHAT_MODE.to_string(), None).await?;
        }
        CallbackAction::ModeToken => {
            state.sessions.set_mode(user_key, Mode::Token).await;
            show(&bot, &q, views::TOKEN_MODE.to_string(), None).await?;
        }
        CallbackAction::ModeWallet => {
            state.sessions.set_mode(user_key, Mode::Wallet).await;
            show(&bot, &q, views::WALLET_MODE.to_string(), Some(keyboards::wallet_menu())).await?;
        }
        CallbackAction::BackToMenu => {
            state.sessions.set_mode(user_key, Mode::Wallet).await;
            show(&bot, &q, views::WALLET_MENU.to_string(), Some(keyboards::wallet_menu())).await?;
        }
        CallbackAction::ImportWallet => {
            let text = match state.wallets.create_wallet(&owner).await {
                Ok(wallet) => views::wallet_created(&wallet),
                Err(e) => {
                    error!("Failed to create wallet for user {}: {:#}", user, e);
                    format!("❌ Failed to create wallet: {}", e)
                }
            };
            show(&bot, &q, text, None).await?;
        }
        CallbackAction::ListWallets => {
            let wallets = state.wallets.list(&owner).await;
            let keyboard = if wallets.is_empty() {
                None
            } else {
                Some(keyboards::wallet_list(wallets.len()))
            };
            show(&bot, &q, views::wallet_list(&wallets), keyboard).await?;
        }
        CallbackAction::SelectWallet(index) => {
            let wallet = match state.wallets.get(&owner, index).await {
                Some(wallet) => wallet,
                None => return show(&bot, &q, views::INVALID_WALLET.to_string(), None).await,
            };
            state.sessions.select_wallet(user_key, index).await;

            let balance = match wallet.pubkey() {
                Ok(pubkey) => state.solana.get_sol_balance(&pubkey).await.unwrap_or_else(|e| {
                    error!("Error getting balance of {}: {:#}", wallet.public_key, e);
                    0.0
                }),
                Err(e) => {
                    error!("Stored wallet has a bad public key: {:#}", e);
                    0.0
                }
            };
            show(
                &bot,
                &q,
                views::wallet_selected(index, &wallet, balance),
                Some(keyboards::wallet_actions()),
            )
            .await?;
        }
        CallbackAction::AddSol => {
            let index = match state.sessions.get(user_key).await.selected_wallet {
                Some(index) => index,
                None => return show(&bot, &q, views::SELECT_WALLET_FIRST.to_string(), None).await,
            };
            match state.wallets.get(&owner, index).await {
                Some(wallet) => {
                    show(&bot, &q, views::deposit(&wallet), Some(keyboards::back_to_wallet(index))).await?
                }
                None => show(&bot, &q, views::INVALID_WALLET.to_string(), None).await?,
            }
        }
        CallbackAction::Trade(kind) => start_trade(&bot, &q, &state, kind).await?,
        CallbackAction::CancelTrade => {
            state.sessions.clear_trade(user_key).await;
            show(&bot, &q, views::TRADE_CANCELLED.to_string(), Some(keyboards::wallet_menu())).await?;
        }
    }
    Ok(())
}

async fn start_trade(bot: &Bot, q: &CallbackQuery, state: &BotState, kind: TradeKind) -> ResponseResult<()> {
    if !state.wallets.has_wallet(&wallet_owner(q.from.id)).await {
        return show(bot, q, views::NEED_WALLET.to_string(), None).await;
    }
    let (step, prompt) = TradeStep::start(kind);
    state.sessions.start_trade(q.from.id.0 as i64, step).await;
    show(bot, q, prompt.to_string(), Some(keyboards::cancel_trade())).await
}

/// Replaces the message the button was attached to. Without one (old
/// inline messages) a new message goes to the user instead.
async fn show(
    bot: &Bot,
    q: &CallbackQuery,
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<()> {
    let result = match &q.message {
        Some(msg) => {
            let request = bot.edit_message_text(msg.chat.id, msg.id, text);
            match keyboard {
                Some(kb) => request.reply_markup(kb).await,
                None => request.await,
            }
        }
        None => {
            let request = bot.send_message(ChatId(q.from.id.0 as i64), text);
            match keyboard {
                Some(kb) => request.reply_markup(kb).await,
                None => request.await,
            }
        }
    };

    match result {
        Ok(_) => Ok(()),
        Err(RequestError::Api(ApiError::MessageNotModified)) => {
            debug!("Message already shows this content");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
