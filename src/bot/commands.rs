use std::sync::Arc;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::{BotCommands, ParseError};
use tracing::{error, info, warn};

use crate::bot::callbacks::callback_handler;
use crate::bot::messages::{message_handler, token_report};
use crate::bot::{keyboards, views, wallet_owner, BotState};

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show the mode menu")]
    Start,
    #[command(description = "Show this help message")]
    Help,
    #[command(
        description = "Create a new wallet, or import one by passing its private key",
        parse_with = rest_of_line
    )]
    Import { secret: String },
    #[command(description = "List your wallets")]
    List,
    #[command(description = "Token market data and honeypot check", parse_with = rest_of_line)]
    Token { address: String },
    #[command(description = "Abort the current trade")]
    Cancel,
}

// Takes the argument text as-is, so a bare `/import` parses with an empty secret
fn rest_of_line(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

pub async fn command_handler(bot: Bot, msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let user = match msg.from() {
        Some(user) => user.id,
        None => return Ok(()),
    };

    if !state.is_authorized(Some(user)) {
        warn!("Unauthorized access attempt by user: {}", user);
        bot.send_message(chat_id, views::UNAUTHORIZED).await?;
        return Ok(());
    }

    // Never log the secret passed to /import
    match &cmd {
        Command::Import { .. } => info!("Received command: Import from user: {}", user),
        other => info!("Received command: {:?} from user: {}", other, user),
    }

    let owner = wallet_owner(user);
    match cmd {
        Command::Start => {
            bot.send_message(chat_id, views::welcome(state.config.demo_mode))
                .reply_markup(keyboards::mode_menu())
                .await?;
        }
        Command::Help => {
            bot.send_message(chat_id, views::help())
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Import { secret } => {
            let secret = secret.trim();
            if secret.is_empty() {
                let text = match state.wallets.create_wallet(&owner).await {
                    Ok(wallet) => views::wallet_created(&wallet),
                    Err(e) => {
                        error!("Failed to create wallet for user {}: {:#}", user, e);
                        format!("❌ Failed to create wallet: {}", e)
                    }
                };
                bot.send_message(chat_id, text).await?;
            } else {
                // The secret should not stay in the chat history
                if let Err(e) = bot.delete_message(chat_id, msg.id).await {
                    warn!("Could not delete /import message: {}", e);
                }
                let text = match state.wallets.import_wallet(&owner, secret).await {
                    Ok(wallet) => views::wallet_imported(&wallet),
                    Err(e) => {
                        warn!("Wallet import failed for user {}: {}", user, e);
                        format!("❌ Failed to import wallet: {}", e)
                    }
                };
                bot.send_message(chat_id, text).await?;
            }
        }
        Command::List => {
            let wallets = state.wallets.list(&owner).await;
            let request = bot.send_message(chat_id, views::wallet_list(&wallets));
            if wallets.is_empty() {
                request.await?;
            } else {
                request.reply_markup(keyboards::wallet_list(wallets.len())).await?;
            }
        }
        Command::Token { address } => {
            let address = address.trim();
            if address.is_empty() {
                bot.send_message(chat_id, views::TOKEN_USAGE).await?;
                return Ok(());
            }
            bot.send_message(chat_id, views::FETCHING_TOKEN).await?;
            let report = token_report(&state, address).await;
            bot.send_message(chat_id, report).await?;
        }
        Command::Cancel => {
            let text = if state.sessions.clear_trade(user.0 as i64).await {
                views::TRADE_CANCELLED
            } else {
                views::NOTHING_TO_CANCEL
            };
            bot.send_message(chat_id, text).await?;
        }
    }

    Ok(())
}

async fn unknown_command(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, views::UNKNOWN_COMMAND).await?;
    Ok(())
}

fn is_command_like(msg: Message) -> bool {
    msg.text().map(|text| text.starts_with('/')).unwrap_or(false)
}

/// Runs long polling until the process is stopped.
pub async fn start_bot(bot: Bot, state: Arc<BotState>) -> anyhow::Result<()> {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register the command list with Telegram: {}", e);
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(dptree::entry().filter_command::<Command>().endpoint(command_handler))
                .branch(dptree::filter(is_command_like).endpoint(unknown_command))
                .branch(dptree::endpoint(message_handler)),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    info!("Dispatcher running, waiting for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
