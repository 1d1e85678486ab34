use anyhow::Result;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{keypair_from_seed, Keypair},
    signer::Signer, // Import the Signer trait explicitly
    transaction::VersionedTransaction,
};
use std::str::FromStr;
use tracing::{debug, error};

use crate::error::BotError;

/// A custodial wallet as persisted in the wallet file.
/// The private key is kept in plaintext hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub public_key: String,
    pub private_key: String,
}

impl WalletRecord {
    /// Generates a brand new keypair.
    pub fn generate() -> Self {
        Self::from_keypair(&Keypair::new())
    }

    /// Imports an existing secret. Accepts hex (64-byte keypair or 32-byte seed)
    /// or a base58 encoded 64-byte keypair as exported by most Solana wallets.
    pub fn import(secret: &str) -> Result<Self> {
        let secret = secret.trim();
        let bytes = match hex::decode(secret) {
            Ok(bytes) => bytes,
            Err(_) => bs58::decode(secret).into_vec().map_err(|e| {
                error!("Failed to decode imported private key: {}", e);
                BotError::WalletError("Private key must be hex or base58 encoded".to_string())
            })?,
        };
        let keypair = keypair_from_bytes(&bytes)?;
        Ok(Self::from_keypair(&keypair))
    }

    pub fn from_keypair(keypair: &Keypair) -> Self {
        Self {
            public_key: keypair.pubkey().to_string(),
            private_key: hex::encode(keypair.to_bytes()),
        }
    }

    /// Rebuilds the signing keypair from the stored hex secret.
    pub fn keypair(&self) -> Result<Keypair> {
        let bytes = hex::decode(self.private_key.trim())
            .map_err(|e| BotError::WalletError(format!("Invalid private key format: {}", e)))?;
        let keypair = keypair_from_bytes(&bytes)?;

        if keypair.pubkey().to_string() != self.public_key {
            return Err(BotError::WalletError(format!(
                "Stored private key does not match public key {}",
                self.public_key
            ))
            .into());
        }
        Ok(keypair)
    }

    pub fn pubkey(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.public_key)
            .map_err(|e| BotError::WalletError(format!("Invalid public key {}: {}", self.public_key, e)).into())
    }
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    let keypair = match bytes.len() {
        64 => Keypair::from_bytes(bytes)
            .map_err(|e| BotError::WalletError(format!("Invalid private key data: {}", e)))?,
        32 => keypair_from_seed(bytes)
            .map_err(|e| BotError::WalletError(format!("Invalid private key seed: {}", e)))?,
        n => {
            return Err(BotError::WalletError(format!(
                "Private key must be 32 or 64 bytes, got {}",
                n
            ))
            .into())
        }
    };
    Ok(keypair)
}

/// Signs an aggregator-built transaction in place. The blockhash is replaced
/// before signing so the signature covers the final message.
pub fn sign_versioned_transaction(
    transaction: &mut VersionedTransaction,
    keypair: &Keypair,
    recent_blockhash: Hash,
) -> Result<()> {
    transaction.message.set_recent_blockhash(recent_blockhash);

    let message_bytes = transaction.message.serialize();
    let signature = keypair.try_sign_message(&message_bytes).map_err(|e| {
        error!("Failed to sign versioned transaction message: {}", e);
        BotError::WalletError(format!("Signing failed: {}", e))
    })?;

    // Payer signature slot is always first
    if transaction.signatures.is_empty() {
        error!("Transaction has no signature slots to place signature.");
        return Err(BotError::WalletError("Transaction has no signature slots".to_string()).into());
    }
    transaction.signatures[0] = signature;

    debug!(
        "Signed versioned transaction for {} with blockhash: {}",
        keypair.pubkey(),
        transaction.message.recent_blockhash()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        message::{Message, VersionedMessage},
        signature::Signature,
        system_instruction,
    };

    #[test]
    fn test_generate_roundtrips_through_keypair() {
        let record = WalletRecord::generate();
        assert_eq!(record.private_key.len(), 128); // 64 bytes hex
        let keypair = record.keypair().unwrap();
        assert_eq!(keypair.pubkey().to_string(), record.public_key);
        assert_eq!(record.pubkey().unwrap(), keypair.pubkey());
    }

    #[test]
    fn test_import_hex_and_base58() {
        let keypair = Keypair::new();
        let from_hex = WalletRecord::import(&hex::encode(keypair.to_bytes())).unwrap();
        let from_b58 = WalletRecord::import(&keypair.to_base58_string()).unwrap();
        assert_eq!(from_hex.public_key, keypair.pubkey().to_string());
        assert_eq!(from_hex, from_b58);
    }

    #[test]
    fn test_seed_only_record_still_loads() {
        let seed = [7u8; 32];
        let expected = keypair_from_seed(&seed).unwrap();
        let record = WalletRecord {
            public_key: expected.pubkey().to_string(),
            private_key: hex::encode(seed),
        };
        assert_eq!(record.keypair().unwrap().pubkey(), expected.pubkey());
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(WalletRecord::import("not a key at all!").is_err());
        assert!(WalletRecord::import(&hex::encode([1u8; 10])).is_err());

        let mut record = WalletRecord::generate();
        record.public_key = Keypair::new().pubkey().to_string();
        assert!(record.keypair().is_err());
    }

    #[test]
    fn test_sign_versioned_transaction() {
        let payer = Keypair::new();
        let recipient = Pubkey::new_unique();
        let ix = system_instruction::transfer(&payer.pubkey(), &recipient, 1_000);
        let message = Message::new(&[ix], Some(&payer.pubkey()));
        let mut tx = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(message),
        };

        let blockhash = Hash::new_unique();
        sign_versioned_transaction(&mut tx, &payer, blockhash).unwrap();

        assert_eq!(*tx.message.recent_blockhash(), blockhash);
        assert_ne!(tx.signatures[0], Signature::default());
        assert!(tx.verify_with_results().into_iter().all(|ok| ok));
    }

    #[test]
    fn test_sign_without_slots_fails() {
        let payer = Keypair::new();
        let message = Message::new(&[], Some(&payer.pubkey()));
        let mut tx = VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::Legacy(message),
        };
        assert!(sign_versioned_transaction(&mut tx, &payer, Hash::new_unique()).is_err());
    }
}
