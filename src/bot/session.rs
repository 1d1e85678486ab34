use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::trading::flow::TradeStep;

/// How free text from a user is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Chat,
    Wallet,
    Token,
}

/// Per-user conversation state. Lives in memory only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub mode: Mode,
    pub trade: Option<TradeStep>,
    /// Zero-based index into the user's wallet list.
    pub selected_wallet: Option<usize>,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: i64) -> Session {
        let sessions = self.sessions.read().await;
        sessions.get(&user_id).cloned().unwrap_or_default()
    }

    pub async fn update<F, R>(&self, user_id: i64, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.sessions.write().await;
        f(sessions.entry(user_id).or_default())
    }

    pub async fn set_mode(&self, user_id: i64, mode: Mode) {
        debug!("User {} switched to {:?} mode", user_id, mode);
        self.update(user_id, |s| s.mode = mode).await
    }

    /// Enters wallet mode with a fresh trade, replacing any pending one.
    pub async fn start_trade(&self, user_id: i64, step: TradeStep) {
        debug!("User {} started a {} flow", user_id, step.kind());
        self.update(user_id, |s| {
            s.mode = Mode::Wallet;
            s.trade = Some(step);
        })
        .await
    }

    /// Removes the pending step so it can be advanced. The caller puts the
    /// next step back with `set_trade`; anything else leaves the flow cleared.
    pub async fn take_trade(&self, user_id: i64) -> Option<TradeStep> {
        self.update(user_id, |s| s.trade.take()).await
    }

    pub async fn set_trade(&self, user_id: i64, step: TradeStep) {
        self.update(user_id, |s| s.trade = Some(step)).await
    }

    /// Clears the pending trade. Returns whether there was one.
    pub async fn clear_trade(&self, user_id: i64) -> bool {
        self.update(user_id, |s| s.trade.take().is_some()).await
    }

    pub async fn select_wallet(&self, user_id: i64, index: usize) {
        self.update(user_id, |s| s.selected_wallet = Some(index)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::flow::TradeKind;

    #[tokio::test]
    async fn test_new_user_defaults_to_chat() {
        let store = SessionStore::new();
        assert_eq!(store.get(1).await, Session::default());
        assert_eq!(store.get(1).await.mode, Mode::Chat);
    }

    #[tokio::test]
    async fn test_trade_lifecycle() {
        let store = SessionStore::new();
        let (step, _) = TradeStep::start(TradeKind::Sell);
        store.start_trade(7, step.clone()).await;

        let session = store.get(7).await;
        assert_eq!(session.mode, Mode::Wallet);
        assert_eq!(session.trade, Some(step.clone()));

        assert_eq!(store.take_trade(7).await, Some(step));
        assert_eq!(store.take_trade(7).await, None);

        store.set_trade(7, TradeStep::SwapFrom).await;
        assert!(store.clear_trade(7).await);
        assert!(!store.clear_trade(7).await);
        // Mode survives the cleared flow
        assert_eq!(store.get(7).await.mode, Mode::Wallet);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = SessionStore::new();
        store.set_mode(1, Mode::Token).await;
        store.select_wallet(2, 3).await;

        assert_eq!(store.get(1).await.mode, Mode::Token);
        assert_eq!(store.get(1).await.selected_wallet, None);
        assert_eq!(store.get(2).await.mode, Mode::Chat);
        assert_eq!(store.get(2).await.selected_wallet, Some(3));
    }
}
