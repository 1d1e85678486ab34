//! Custodial wallet store.
//!
//! Maps a Telegram user id to the ordered list of wallets the bot holds for
//! that user. The whole map is written to a single JSON file after every
//! mutation and read back once at startup.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::BotError;
use crate::solana::wallet::WalletRecord;

type WalletMap = HashMap<String, Vec<WalletRecord>>;

pub struct WalletStore {
    wallets: RwLock<WalletMap>,
    path: PathBuf,
}

impl WalletStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads wallets from disk. A missing or empty file means no wallets yet.
    pub async fn load(&self) -> Result<()> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Wallet file {:?} not found, starting with an empty store", self.path);
                return Ok(());
            }
            Err(e) => return Err(e).context(format!("Failed to read wallet file: {:?}", self.path)),
        };

        if data.trim().is_empty() {
            info!("Wallet file {:?} is empty", self.path);
            return Ok(());
        }

        let loaded: WalletMap = serde_json::from_str(&data)
            .map_err(|e| BotError::StorageError(format!("Wallet file {:?} is corrupted: {}", self.path, e)))?;

        let wallet_count: usize = loaded.values().map(Vec::len).sum();
        let mut wallets = self.wallets.write().await;
        *wallets = loaded;
        info!("Loaded {} wallets for {} users from {:?}", wallet_count, wallets.len(), self.path);
        Ok(())
    }

    /// Persists the current map. Writes a temp file and renames it over the target.
    pub async fn save(&self) -> Result<()> {
        let wallets = self.wallets.read().await;
        self.write_file(&wallets).await
    }

    async fn write_file(&self, wallets: &WalletMap) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await.context("Failed to create wallet directory")?;
            }
        }

        let data = serde_json::to_string_pretty(wallets).context("Failed to serialize wallets")?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, data)
            .await
            .context(format!("Failed to write temporary wallet file: {:?}", temp_path))?;
        fs::rename(&temp_path, &self.path)
            .await
            .context(format!("Failed to rename temporary wallet file to {:?}", self.path))?;

        debug!("💾 Saved wallets for {} users to {:?}", wallets.len(), self.path);
        Ok(())
    }

    /// Generates a new wallet for the user, appends it and persists.
    pub async fn create_wallet(&self, user_id: &str) -> Result<WalletRecord> {
        let record = WalletRecord::generate();
        self.append(user_id, record).await
    }

    /// Imports an existing private key for the user. A key the user already
    /// stores is rejected.
    pub async fn import_wallet(&self, user_id: &str, secret: &str) -> Result<WalletRecord> {
        let record = WalletRecord::import(secret)?;
        self.append(user_id, record).await
    }

    async fn append(&self, user_id: &str, record: WalletRecord) -> Result<WalletRecord> {
        let mut wallets = self.wallets.write().await;
        let list = wallets.entry(user_id.to_string()).or_default();
        if list.iter().any(|w| w.public_key == record.public_key) {
            warn!("User {} tried to store wallet {} twice", user_id, record.public_key);
            return Err(BotError::WalletError(format!("Wallet {} is already stored", record.public_key)).into());
        }
        list.push(record.clone());

        // Hold the write lock while persisting so saves never interleave
        if let Err(e) = self.write_file(&wallets).await {
            if let Some(list) = wallets.get_mut(user_id) {
                list.pop();
            }
            return Err(e);
        }

        info!("👛 Stored wallet {} for user {}", record.public_key, user_id);
        Ok(record)
    }

    pub async fn list(&self, user_id: &str) -> Vec<WalletRecord> {
        let wallets = self.wallets.read().await;
        wallets.get(user_id).cloned().unwrap_or_default()
    }

    /// Wallet at a zero-based index.
    pub async fn get(&self, user_id: &str, index: usize) -> Option<WalletRecord> {
        let wallets = self.wallets.read().await;
        wallets.get(user_id).and_then(|list| list.get(index)).cloned()
    }

    pub async fn first(&self, user_id: &str) -> Option<WalletRecord> {
        self.get(user_id, 0).await
    }

    pub async fn has_wallet(&self, user_id: &str) -> bool {
        let wallets = self.wallets.read().await;
        wallets.get(user_id).map(|list| !list.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Keypair;
    use solana_sdk::signer::Signer;
    use tokio_test::{assert_err, assert_ok};

    fn temp_wallet_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir()
            .join(format!("wallet_store_{}_{}_{}", name, std::process::id(), nanos))
            .join("wallets.json")
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let store = WalletStore::new(temp_wallet_path("missing"));
        store.load().await.unwrap();
        assert!(!store.has_wallet("1").await);
        assert!(store.list("1").await.is_empty());
        assert!(store.first("1").await.is_none());
    }

    #[tokio::test]
    async fn test_create_persists_and_reloads_in_order() {
        let path = temp_wallet_path("create");
        let store = WalletStore::new(path.clone());

        let first = store.create_wallet("42").await.unwrap();
        let second = store.create_wallet("42").await.unwrap();
        store.create_wallet("7").await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = WalletStore::new(path);
        reloaded.load().await.unwrap();
        let list = reloaded.list("42").await;
        assert_eq!(list, vec![first.clone(), second.clone()]);
        assert_eq!(reloaded.first("42").await, Some(first));
        assert_eq!(reloaded.get("42", 1).await, Some(second));
        assert!(reloaded.get("42", 2).await.is_none());
        assert_eq!(reloaded.list("7").await.len(), 1);
    }

    #[tokio::test]
    async fn test_file_shape_is_user_to_wallet_list() {
        let path = temp_wallet_path("shape");
        let store = WalletStore::new(path.clone());
        let record = store.create_wallet("99").await.unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["99"][0]["public_key"], record.public_key.as_str());
        assert_eq!(raw["99"][0]["private_key"], record.private_key.as_str());
    }

    #[tokio::test]
    async fn test_import_rejects_duplicates() {
        let store = WalletStore::new(temp_wallet_path("import"));
        let keypair = Keypair::new();
        let secret = keypair.to_base58_string();

        let record = store.import_wallet("5", &secret).await.unwrap();
        assert_eq!(record.public_key, keypair.pubkey().to_string());
        assert_err!(store.import_wallet("5", &secret).await);
        // Another user may hold the same key
        assert_ok!(store.import_wallet("6", &secret).await);
        assert_eq!(store.list("5").await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_imports_store_key_once() {
        let store = std::sync::Arc::new(WalletStore::new(temp_wallet_path("race")));
        let secret = Keypair::new().to_base58_string();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let secret = secret.clone();
                tokio::spawn(async move { store.import_wallet("11", &secret).await.is_ok() })
            })
            .collect();
        let mut stored = 0;
        for handle in handles {
            if handle.await.unwrap() {
                stored += 1;
            }
        }

        assert_eq!(stored, 1);
        assert_eq!(store.list("11").await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_error() {
        let path = temp_wallet_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let store = WalletStore::new(path);
        assert_err!(store.load().await);
    }
}
