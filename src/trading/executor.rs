use anyhow::{Context, Result};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::jupiter::{decode_swap_transaction, JupiterClient, SOL_MINT};
use crate::config::Config;
use crate::error::BotError;
use crate::solana::client::SolanaClient;
use crate::solana::wallet::sign_versioned_transaction;
use crate::trading::flow::{TradeKind, TradeOrder};

const SOL_DECIMALS: u8 = 9;

/// Result of a swap that went through.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub signature: String,
    /// Quoted output in UI units of the output mint.
    pub quoted_out_ui: f64,
    pub price_impact_pct: f64,
    /// Demo mode: simulated against the cluster, never sent.
    pub simulated: bool,
}

/// Converts a UI amount into base units for a mint with `decimals`.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u64, BotError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(BotError::InvalidAmount(format!("amount must be positive, got {}", amount)));
    }
    let scaled = (amount * 10f64.powi(decimals as i32)).round();
    if scaled < 1.0 {
        return Err(BotError::InvalidAmount(format!(
            "{} is below the smallest unit of a {}-decimal token",
            amount, decimals
        )));
    }
    if scaled >= u64::MAX as f64 {
        return Err(BotError::InvalidAmount(format!("{} is too large", amount)));
    }
    Ok(scaled as u64)
}

pub struct TradeExecutor {
    jupiter: Arc<JupiterClient>,
    solana: Arc<SolanaClient>,
    slippage_bps: u32,
    priority_fee_micro_lamports: Option<u64>,
    demo_mode: bool,
    confirm_timeout_secs: u64,
}

impl TradeExecutor {
    pub fn new(jupiter: Arc<JupiterClient>, solana: Arc<SolanaClient>, config: &Config) -> Self {
        Self {
            jupiter,
            solana,
            slippage_bps: config.default_slippage_bps,
            priority_fee_micro_lamports: config.priority_fee_micro_lamports,
            demo_mode: config.demo_mode,
            confirm_timeout_secs: config.confirm_timeout_secs,
        }
    }

    pub fn is_demo(&self) -> bool {
        self.demo_mode
    }

    /// Checks run before any quote is requested. Returns the reply to send
    /// when the order must not go ahead.
    ///
    /// Buy orders need a live price for the target token. Every order needs
    /// enough of the input mint; a balance that cannot be read is not fatal.
    pub async fn pre_trade_check(&self, order: &TradeOrder, owner: &Pubkey) -> Option<String> {
        if order.kind == TradeKind::Buy {
            let price = self.jupiter.get_price(&order.output_mint).await;
            if price == 0.0 {
                warn!("No price for {}, refusing buy", order.output_mint);
                return Some("Could not get token price. Please try again.".to_string());
            }
            info!("Current price of {}: ${}", order.output_mint, price);
        }

        let balance = if order.input_mint == SOL_MINT {
            self.solana.get_sol_balance(owner).await
        } else {
            match Pubkey::from_str(&order.input_mint) {
                Ok(mint) => self.solana.get_token_balance_ui(owner, &mint).await,
                Err(_) => return None,
            }
        };
        match balance {
            Ok(held) if held < order.amount => Some(format!(
                "Insufficient balance: the wallet holds {} but the order needs {}.",
                held, order.amount
            )),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not check {} balance of {}: {:#}", order.input_mint, owner, e);
                None
            }
        }
    }

    /// Decimals of `mint`. Falls back to 9 when the mint cannot be read.
    pub async fn mint_decimals(&self, mint: &str) -> u8 {
        if mint == SOL_MINT {
            return SOL_DECIMALS;
        }
        let pubkey = match Pubkey::from_str(mint) {
            Ok(p) => p,
            Err(_) => return SOL_DECIMALS,
        };
        match self.solana.get_mint_decimals(&pubkey).await {
            Ok(decimals) => decimals,
            Err(e) => {
                warn!("Could not read decimals of {}, assuming {}: {}", mint, SOL_DECIMALS, e);
                SOL_DECIMALS
            }
        }
    }

    /// Quotes, builds, signs and submits the swap for `order`.
    pub async fn execute(&self, keypair: &Keypair, order: &TradeOrder) -> Result<SwapOutcome> {
        let user = keypair.pubkey().to_string();
        info!(
            "Executing {} for {}: {} {} -> {}",
            order.kind, user, order.amount, order.input_mint, order.output_mint
        );

        let decimals = self.mint_decimals(&order.input_mint).await;
        let amount = to_base_units(order.amount, decimals)?;

        let quote = self
            .jupiter
            .get_quote(&order.input_mint, &order.output_mint, amount, self.slippage_bps)
            .await
            .context("Failed to get quote")?;
        let out_decimals = self.mint_decimals(&order.output_mint).await;
        let quoted_out_ui = spl_token::amount_to_ui_amount(quote.out_amount_base_units()?, out_decimals);
        let price_impact_pct = quote.price_impact();

        let swap = self
            .jupiter
            .get_swap_transaction(&quote, &user, self.priority_fee_micro_lamports)
            .await
            .context("Failed to get swap transaction")?;
        let mut transaction = decode_swap_transaction(&swap)?;

        let blockhash = self.solana.get_latest_blockhash().await?;
        sign_versioned_transaction(&mut transaction, keypair, blockhash)?;
        let signature = transaction
            .signatures
            .first()
            .map(|s| s.to_string())
            .unwrap_or_default();

        if self.demo_mode {
            self.solana
                .simulate_versioned_transaction(&transaction)
                .await
                .context("Swap simulation failed")?;
            info!("[DEMO] Simulated {} swap {}, not sent", order.kind, signature);
            return Ok(SwapOutcome {
                signature,
                quoted_out_ui,
                price_impact_pct,
                simulated: true,
            });
        }

        let sent = self
            .solana
            .send_versioned_transaction(&transaction)
            .await
            .context("Failed to send swap transaction")?;
        info!("Swap transaction sent: {}", sent);
        self.solana
            .confirm_transaction(&sent, self.confirm_timeout_secs)
            .await
            .context("Swap was sent but not confirmed")?;

        Ok(SwapOutcome {
            signature: sent.to_string(),
            quoted_out_ui,
            price_impact_pct,
            simulated: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    fn test_config(demo_mode: bool) -> Config {
        Config::from_source(|key| match key {
            "TELEGRAM_TOKEN" => Some("t".to_string()),
            "DEMO_MODE" => Some(demo_mode.to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn executor_for(jupiter_url: &str) -> TradeExecutor {
        let jupiter = Arc::new(JupiterClient::new(jupiter_url, None).unwrap());
        // Nothing listens here; tests only reach paths that skip the RPC
        let solana = Arc::new(SolanaClient::new("http://127.0.0.1:1"));
        TradeExecutor::new(jupiter, solana, &test_config(false))
    }

    fn buy_order() -> TradeOrder {
        TradeOrder {
            kind: TradeKind::Buy,
            input_mint: SOL_MINT.to_string(),
            output_mint: BONK.to_string(),
            amount: 0.1,
            info_token: BONK.to_string(),
        }
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(1.5, 9).unwrap(), 1_500_000_000);
        assert_eq!(to_base_units(0.1, 9).unwrap(), 100_000_000);
        assert_eq!(to_base_units(25.0, 6).unwrap(), 25_000_000);
        assert_eq!(to_base_units(3.0, 0).unwrap(), 3);
        assert!(to_base_units(0.0, 9).is_err());
        assert!(to_base_units(-1.0, 9).is_err());
        assert!(to_base_units(f64::NAN, 9).is_err());
        assert!(to_base_units(0.0000001, 6).is_err());
        assert!(to_base_units(1e30, 9).is_err());
    }

    #[tokio::test]
    async fn test_sol_decimals_need_no_rpc() {
        let executor = executor_for("http://127.0.0.1:1");
        assert_eq!(executor.mint_decimals(SOL_MINT).await, 9);
        // Unreachable RPC falls back to 9
        assert_eq!(executor.mint_decimals(BONK).await, 9);
    }

    #[tokio::test]
    async fn test_pre_trade_check() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/price")
            .match_query(Matcher::UrlEncoded("ids".into(), BONK.into()))
            .with_status(200)
            .with_body(format!(r#"{{"data":{{"{}":{{"price":"0.00002"}}}}}}"#, BONK))
            .create_async()
            .await;
        let executor = executor_for(&server.url());
        let owner = Pubkey::new_unique();
        // Balance lookups fail against the dead RPC and do not block the order
        assert_eq!(executor.pre_trade_check(&buy_order(), &owner).await, None);

        let unpriced = TradeOrder {
            output_mint: SOL_MINT.to_string(),
            ..buy_order()
        };
        // No mock for this id: mockito answers 501
        assert_eq!(
            executor.pre_trade_check(&unpriced, &owner).await,
            Some("Could not get token price. Please try again.".to_string())
        );

        let sell = TradeOrder {
            kind: TradeKind::Sell,
            ..unpriced
        };
        assert_eq!(executor.pre_trade_check(&sell, &owner).await, None);
    }

    #[tokio::test]
    async fn test_execute_stops_on_quote_failure() {
        let mut server = mockito::Server::new_async().await;
        let quote = server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("amount".into(), "100000000".into()))
            .with_status(400)
            .with_body(r#"{"error":"TOKEN_NOT_TRADABLE"}"#)
            .expect(1)
            .create_async()
            .await;
        let swap = server.mock("POST", "/swap").expect(0).create_async().await;

        let executor = executor_for(&server.url());
        let err = executor.execute(&Keypair::new(), &buy_order()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("TOKEN_NOT_TRADABLE"));
        quote.assert_async().await;
        swap.assert_async().await;
    }
}
