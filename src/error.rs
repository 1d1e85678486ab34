use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Solana error: {0}")]
    SolanaError(String),

    #[error("Wallet error: {0}")]
    WalletError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid token address: {0}")]
    InvalidTokenAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}
