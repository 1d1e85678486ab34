//! Reply texts shared by commands, callbacks and free-text handlers.

use teloxide::utils::html::escape;

use crate::solana::wallet::WalletRecord;
use crate::trading::executor::SwapOutcome;
use crate::trading::flow::TradeOrder;

pub const UNKNOWN_COMMAND: &str = "Sorry, I didn't understand that command. Please use the menu buttons.";
pub const UNAUTHORIZED: &str = "⚠️ You are not authorized to use this bot. Please contact the administrator.";
pub const NEED_WALLET: &str = "You need to import a wallet first!";
pub const NO_WALLETS: &str = "You have no wallets stored.";
pub const INVALID_WALLET: &str = "Invalid wallet selection!";
pub const SELECT_ACTION_FIRST: &str = "Please select an action first!";
pub const SELECT_WALLET_FIRST: &str = "Please select a wallet first!";
pub const TOKEN_NOT_FOUND: &str = "Could not fetch token information. Please check the token address and try again.";
pub const TOKEN_INFO_UNAVAILABLE: &str = "Token info unavailable.";
pub const INVALID_TOKEN_ADDRESS: &str = "Please provide a valid token address.";
pub const FETCHING_TOKEN: &str = "Fetching token information...";
pub const CHAT_DISABLED: &str = "AI chat is not configured. Set OPENAI_API_KEY to enable it.";
pub const CHAT_MODE: &str = "AI Chat Mode activated! Just send me a message.";
pub const TOKEN_MODE: &str = "Token Info Mode activated! Send me a token address to get detailed information.";
pub const WALLET_MODE: &str = "Wallet Mode activated! What would you like to do?";
pub const WALLET_MENU: &str = "What would you like to do?";
pub const TRADE_CANCELLED: &str = "Trade cancelled.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
pub const TOKEN_USAGE: &str = "Usage: /token ADDRESS";

pub fn welcome(demo_mode: bool) -> String {
    let mut text = "Welcome! Please select a mode:".to_string();
    if demo_mode {
        text.push_str("\n\n🧪 Demo mode: trades are simulated, never sent.");
    }
    text
}

/// HTML formatted.
pub fn help() -> String {
    format!(
        "🤖 <b>Bot Help</b>\n\n\
         • Use the menu buttons to switch between AI Chat, Wallet, and Token Info modes.\n\
         • In Wallet Mode, you can import, list, and manage your Solana wallets.\n\
         • In Token Info Mode, send a token address to get market data.\n\
         • Use /start to return to the main menu at any time.\n\n\
         <b>Commands</b>\n\
         /start - Show the mode menu\n\
         /import - Create a new wallet\n\
         {} - Import an existing private key\n\
         /list - List your wallets\n\
         {} - Token market data and honeypot check\n\
         /cancel - Abort the current trade\n\
         /help - Show this help message",
        escape("/import <private key>"),
        escape("/token <address>"),
    )
}

pub fn wallet_created(wallet: &WalletRecord) -> String {
    format!(
        "New wallet created!\n\n\
         Public Key: {}\n\
         Private Key: {}\n\n\
         ⚠️ IMPORTANT: Keep your private key secure and never share it with anyone!",
        wallet.public_key, wallet.private_key
    )
}

pub fn wallet_imported(wallet: &WalletRecord) -> String {
    format!(
        "Wallet imported!\n\n\
         Public Key: {}\n\n\
         ⚠️ Your message with the private key was deleted from this chat where possible.",
        wallet.public_key
    )
}

pub fn wallet_list(wallets: &[WalletRecord]) -> String {
    if wallets.is_empty() {
        return NO_WALLETS.to_string();
    }
    let mut text = "Your wallets:\n\n".to_string();
    for (i, wallet) in wallets.iter().enumerate() {
        text.push_str(&format!("Wallet {}:\nPublic Key: {}\n\n", i + 1, wallet.public_key));
    }
    text
}

pub fn wallet_selected(index: usize, wallet: &WalletRecord, balance_sol: f64) -> String {
    format!(
        "Wallet {} selected!\n\n\
         Public Key: {}\n\
         Balance: {:.4} SOL\n\n\
         What would you like to do with this wallet?",
        index + 1,
        wallet.public_key,
        balance_sol
    )
}

pub fn deposit(wallet: &WalletRecord) -> String {
    format!(
        "To add SOL to your wallet:\n\n\
         Send SOL to this address:\n{}\n\n\
         The balance will be updated automatically when you return to the wallet view.",
        wallet.public_key
    )
}

pub fn token_report(token_info: &str, honeypot: &str) -> String {
    format!("{}\n\nHoneypot Check: {}", token_info, honeypot)
}

pub fn trade_preview(order: &TradeOrder, token_data: &str, demo_mode: bool) -> String {
    let mut text = format!("{}:\n{}\n\n{}", order.info_heading(), token_data, order.announcement());
    if demo_mode {
        text.push_str("\n🧪 Demo mode: the swap will only be simulated.");
    }
    text
}

pub fn trade_success(order: &TradeOrder, outcome: &SwapOutcome) -> String {
    if outcome.simulated {
        format!(
            "🧪 Simulated: {}\nExpected output: {:.6}\nPrice impact: {:.4}%\nSignature (not sent): {}",
            order.success_message(),
            outcome.quoted_out_ui,
            outcome.price_impact_pct,
            outcome.signature
        )
    } else {
        format!(
            "{}\nExpected output: {:.6}\nPrice impact: {:.4}%\nTransaction: https://solscan.io/tx/{}",
            order.success_message(),
            outcome.quoted_out_ui,
            outcome.price_impact_pct,
            outcome.signature
        )
    }
}
