use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::trading::flow::TradeKind;

/// Every inline button the bot sends, parsed back from its callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    ModeChat,
    ModeWallet,
    ModeToken,
    ImportWallet,
    ListWallets,
    /// Zero-based; the wire format is 1-based.
    SelectWallet(usize),
    BackToMenu,
    AddSol,
    Trade(TradeKind),
    CancelTrade,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            "mode_chat" => CallbackAction::ModeChat,
            "mode_wallet" => CallbackAction::ModeWallet,
            "mode_token" => CallbackAction::ModeToken,
            "import_wallet" => CallbackAction::ImportWallet,
            "list_wallets" => CallbackAction::ListWallets,
            "back_to_menu" => CallbackAction::BackToMenu,
            "add_sol" => CallbackAction::AddSol,
            "buy_tokens" => CallbackAction::Trade(TradeKind::Buy),
            "sell_tokens" => CallbackAction::Trade(TradeKind::Sell),
            "swap_tokens" => CallbackAction::Trade(TradeKind::Swap),
            "cancel_trade" => CallbackAction::CancelTrade,
            other => {
                let number: usize = other.strip_prefix("select_wallet_")?.parse().ok()?;
                CallbackAction::SelectWallet(number.checked_sub(1)?)
            }
        };
        Some(action)
    }

    pub fn as_data(&self) -> String {
        match self {
            CallbackAction::ModeChat => "mode_chat".to_string(),
            CallbackAction::ModeWallet => "mode_wallet".to_string(),
            CallbackAction::ModeToken => "mode_token".to_string(),
            CallbackAction::ImportWallet => "import_wallet".to_string(),
            CallbackAction::ListWallets => "list_wallets".to_string(),
            CallbackAction::SelectWallet(index) => format!("select_wallet_{}", index + 1),
            CallbackAction::BackToMenu => "back_to_menu".to_string(),
            CallbackAction::AddSol => "add_sol".to_string(),
            CallbackAction::Trade(TradeKind::Buy) => "buy_tokens".to_string(),
            CallbackAction::Trade(TradeKind::Sell) => "sell_tokens".to_string(),
            CallbackAction::Trade(TradeKind::Swap) => "swap_tokens".to_string(),
            CallbackAction::CancelTrade => "cancel_trade".to_string(),
        }
    }
}

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.as_data())
}

pub fn mode_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("💭 AI Chat Mode", CallbackAction::ModeChat),
            button("👛 Wallet Mode", CallbackAction::ModeWallet),
        ],
        vec![button("🔍 Token Info Mode", CallbackAction::ModeToken)],
    ])
}

pub fn wallet_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("Import Wallet", CallbackAction::ImportWallet),
            button("List Wallets", CallbackAction::ListWallets),
        ],
        vec![
            button("Buy Tokens", CallbackAction::Trade(TradeKind::Buy)),
            button("Sell Tokens", CallbackAction::Trade(TradeKind::Sell)),
        ],
        vec![
            button("Swap Tokens", CallbackAction::Trade(TradeKind::Swap)),
            button("💭 Switch to Chat", CallbackAction::ModeChat),
        ],
    ])
}

/// One select button per wallet, then a back button.
pub fn wallet_list(count: usize) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = (0..count)
        .map(|i| vec![button(format!("Select Wallet {}", i + 1), CallbackAction::SelectWallet(i))])
        .collect();
    rows.push(vec![button("Back to Menu", CallbackAction::BackToMenu)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn wallet_actions() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("Add SOL", CallbackAction::AddSol)],
        vec![
            button("Buy Tokens", CallbackAction::Trade(TradeKind::Buy)),
            button("Sell Tokens", CallbackAction::Trade(TradeKind::Sell)),
        ],
        vec![button("Swap Tokens", CallbackAction::Trade(TradeKind::Swap))],
        vec![button("Back to Menu", CallbackAction::BackToMenu)],
    ])
}

pub fn back_to_wallet(index: usize) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("Back to Wallet", CallbackAction::SelectWallet(index))]])
}

pub fn cancel_trade() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("❌ Cancel", CallbackAction::CancelTrade)]])
}
