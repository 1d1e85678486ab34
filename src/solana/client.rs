use anyhow::Result;
use solana_client::{
    rpc_client::RpcClient,
    rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig},
    rpc_response::RpcSimulateTransactionResult,
};
use solana_sdk::{
    account::Account,
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_token_2022::extension::StateWithExtensions;
use spl_token_2022::state::{Account as TokenAccount, Mint};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::error::BotError;

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Fails unless `program` is the classic Token program or Token-2022.
pub fn check_token_program(program: &Pubkey, mint: &Pubkey) -> Result<()> {
    if *program == spl_token::id() || *program == spl_token_2022::id() {
        Ok(())
    } else {
        Err(BotError::SolanaError(format!("{} is not a token mint (owner {})", mint, program)).into())
    }
}

/// Decimals from mint account data. Reads classic mints and Token-2022
/// mints with extensions.
pub fn unpack_mint_decimals(data: &[u8]) -> Result<u8> {
    let mint = StateWithExtensions::<Mint>::unpack(data)
        .map_err(|e| BotError::SolanaError(format!("Failed to unpack mint account: {}", e)))?;
    Ok(mint.base.decimals)
}

/// Raw amount from token account data, for either token program.
pub fn unpack_token_amount(data: &[u8]) -> Result<u64> {
    let account = StateWithExtensions::<TokenAccount>::unpack(data)
        .map_err(|e| BotError::SolanaError(format!("Failed to unpack token account: {}", e)))?;
    Ok(account.base.amount)
}

fn is_missing_account(e: &anyhow::Error) -> bool {
    let text = e.to_string();
    text.contains("AccountNotFound") || text.contains("could not find account")
}

#[derive(Clone)]
pub struct SolanaClient {
    rpc_client: Arc<RpcClient>,
    rpc_url: String,
}

impl SolanaClient {
    pub fn new(rpc_url: &str) -> Self {
        // Confirmed commitment for reads and preflight
        let rpc_client = RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed());
        Self {
            rpc_client: Arc::new(rpc_client),
            rpc_url: rpc_url.to_string(),
        }
    }

    // Runs a blocking RPC call on the blocking pool
    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<RpcClient>) -> solana_client::client_error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let client = self.rpc_client.clone();
        let value = tokio::task::spawn_blocking(move || f(client))
            .await?
            .map_err(|e| {
                error!("Solana RPC client error: {:?}", e);
                BotError::SolanaError(format!("RPC Client Error: {}", e))
            })?;
        Ok(value)
    }

    /// Logs whether the RPC endpoint answers. Never fails startup.
    pub async fn health_check(&self) -> bool {
        match self.get_latest_blockhash().await {
            Ok(_) => {
                info!("Successfully connected to Solana RPC: {}", self.rpc_url);
                true
            }
            Err(e) => {
                warn!("Solana RPC {} is not reachable yet: {}", self.rpc_url, e);
                false
            }
        }
    }

    pub async fn get_sol_balance(&self, pubkey: &Pubkey) -> Result<f64> {
        let pubkey_copy = *pubkey;
        let lamports = self
            .run_blocking(move |client| client.get_balance(&pubkey_copy))
            .await?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }

    pub async fn get_account(&self, pubkey: &Pubkey) -> Result<Account> {
        let pubkey_copy = *pubkey;
        self.run_blocking(move |client| client.get_account(&pubkey_copy)).await
    }

    /// Owning token program and decimals of `mint`.
    pub async fn get_mint_info(&self, mint: &Pubkey) -> Result<(Pubkey, u8)> {
        let account = self.get_account(mint).await?;
        check_token_program(&account.owner, mint)?;
        let decimals = unpack_mint_decimals(&account.data)?;
        Ok((account.owner, decimals))
    }

    pub async fn get_mint_decimals(&self, mint: &Pubkey) -> Result<u8> {
        Ok(self.get_mint_info(mint).await?.1)
    }

    /// UI balance of `mint` held in the owner's associated token account,
    /// derived under the mint's own token program. A missing account reads
    /// as zero.
    pub async fn get_token_balance_ui(&self, owner: &Pubkey, mint: &Pubkey) -> Result<f64> {
        let (program, decimals) = self.get_mint_info(mint).await?;
        let ata = get_associated_token_address_with_program_id(owner, mint, &program);
        let account = match self.get_account(&ata).await {
            Ok(account) => account,
            Err(e) if is_missing_account(&e) => {
                warn!("Token account {} not found for mint {}, assuming balance 0", ata, mint);
                return Ok(0.0);
            }
            Err(e) => return Err(e),
        };

        let amount = unpack_token_amount(&account.data)?;
        Ok(spl_token::amount_to_ui_amount(amount, decimals))
    }

    pub async fn get_latest_blockhash(&self) -> Result<Hash> {
        self.run_blocking(|client| client.get_latest_blockhash()).await
    }

    // Sends a VersionedTransaction without confirmation
    pub async fn send_versioned_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            encoding: Some(solana_transaction_status::UiTransactionEncoding::Base64),
            max_retries: Some(5),
            min_context_slot: None,
        };
        let tx = transaction.clone();
        let signature = self
            .run_blocking(move |client| client.send_transaction_with_config(&tx, config))
            .await
            .map_err(|e| BotError::TransactionError(format!("Send failed: {}", e)))?;

        debug!("Transaction sent with signature: {}", signature);
        Ok(signature)
    }

    pub async fn simulate_versioned_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<RpcSimulateTransactionResult> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(CommitmentConfig::confirmed()),
            encoding: Some(solana_transaction_status::UiTransactionEncoding::Base64),
            accounts: None,
            min_context_slot: None,
            inner_instructions: false,
        };
        let tx = transaction.clone();
        let response = self
            .run_blocking(move |client| client.simulate_transaction_with_config(&tx, config))
            .await?;

        let simulation_result = response.value;
        if let Some(err) = &simulation_result.err {
            error!("Transaction simulation failed: {:?}", err);
            return Err(BotError::TransactionError(format!("Simulation failed: {:?}", err)).into());
        }
        debug!("Transaction simulation successful. Logs: {:?}", simulation_result.logs);
        Ok(simulation_result)
    }

    // Polls signature status until confirmed, failed or timed out
    pub async fn confirm_transaction(&self, signature: &Signature, timeout_secs: u64) -> Result<()> {
        let start_time = std::time::Instant::now();
        loop {
            let sig = *signature;
            let statuses = self
                .run_blocking(move |client| client.get_signature_statuses(&[sig]))
                .await?;
            let status = statuses.value.first().cloned().flatten();

            match status.map(|s| s.err) {
                Some(None) => {
                    info!("Transaction {} confirmed.", signature);
                    return Ok(());
                }
                Some(Some(e)) => {
                    error!("Transaction {} failed: {:?}", signature, e);
                    return Err(BotError::TransactionError(format!("Transaction failed: {:?}", e)).into());
                }
                None => {
                    debug!("Transaction {} status not yet available...", signature);
                }
            }

            if start_time.elapsed() > Duration::from_secs(timeout_secs) {
                warn!("Timeout waiting for transaction {} confirmation", signature);
                return Err(BotError::TransactionError("Confirmation timeout".to_string()).into());
            }

            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}
