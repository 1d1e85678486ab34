pub mod wallets;

pub use wallets::WalletStore;
