use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::api::dexscreener::DEXSCREENER_BASE_URL;
use crate::api::jupiter::JUPITER_BASE_URL;
use crate::error::BotError;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub telegram_bot_token: String,
    pub authorized_users: Vec<i64>, // Empty list means the bot is open to everyone

    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub openai_model: String,
    pub openai_max_tokens: u32,

    pub solana_rpc_url: String,
    pub jupiter_api_url: String,
    pub jupiter_api_key: Option<String>,
    pub dexscreener_api_url: String,
    pub dexscreener_retries: u32,

    pub wallets_file: String,

    pub demo_mode: bool,
    pub default_slippage_bps: u32,
    pub priority_fee_micro_lamports: Option<u64>,
    pub confirm_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("TELEGRAM_TOKEN"))
            .context("TELEGRAM_BOT_TOKEN (or TELEGRAM_TOKEN) not set in environment")?;

        let authorized_users = match get("TELEGRAM_ALLOWED_USERS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>().map_err(|_| {
                        BotError::ConfigError(format!("TELEGRAM_ALLOWED_USERS contains a non-numeric id: {}", s))
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            telegram_bot_token,
            authorized_users,

            openai_api_key: get("OPENAI_API_KEY"),
            openai_api_url: get("OPENAI_API_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            openai_max_tokens: parse_or(&get, "OPENAI_MAX_TOKENS", 500)?,

            solana_rpc_url: get("SOLANA_RPC_URL")
                .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string()),
            jupiter_api_url: get("JUPITER_API_URL").unwrap_or_else(|| JUPITER_BASE_URL.to_string()),
            jupiter_api_key: get("JUPITER_API_KEY"),
            dexscreener_api_url: get("DEXSCREENER_API_URL").unwrap_or_else(|| DEXSCREENER_BASE_URL.to_string()),
            dexscreener_retries: parse_or(&get, "DEXSCREENER_RETRIES", 3)?,

            wallets_file: get("WALLETS_FILE").unwrap_or_else(|| "wallets.json".to_string()),

            demo_mode: get("DEMO_MODE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            default_slippage_bps: parse_or(&get, "DEFAULT_SLIPPAGE_BPS", 100)?, // 1%
            priority_fee_micro_lamports: match get("PRIORITY_FEE_MICRO_LAMPORTS") {
                Some(raw) => Some(
                    raw.parse()
                        .map_err(|_| BotError::ConfigError(format!("Failed to parse PRIORITY_FEE_MICRO_LAMPORTS: {}", raw)))?,
                ),
                None => None,
            },
            confirm_timeout_secs: parse_or(&get, "CONFIRM_TIMEOUT_SECS", 60)?,
        })
    }

    pub fn is_authorized(&self, user_id: i64) -> bool {
        self.authorized_users.is_empty() || self.authorized_users.contains(&user_id)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| BotError::ConfigError(format!("Failed to parse {}: {}", key, raw)).into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = config_from(&[("TELEGRAM_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.telegram_bot_token, "123:abc");
        assert_eq!(config.solana_rpc_url, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.jupiter_api_url, "https://quote-api.jup.ag/v6");
        assert_eq!(config.dexscreener_api_url, "https://api.dexscreener.com/latest");
        assert_eq!(config.openai_model, "gpt-3.5-turbo");
        assert_eq!(config.openai_max_tokens, 500);
        assert_eq!(config.dexscreener_retries, 3);
        assert_eq!(config.default_slippage_bps, 100);
        assert_eq!(config.wallets_file, "wallets.json");
        assert!(!config.demo_mode);
        assert!(config.openai_api_key.is_none());
        assert!(config.priority_fee_micro_lamports.is_none());
    }

    #[test]
    fn test_bot_token_preferred_over_legacy_name() {
        let config = config_from(&[("TELEGRAM_BOT_TOKEN", "new"), ("TELEGRAM_TOKEN", "old")]).unwrap();
        assert_eq!(config.telegram_bot_token, "new");
    }

    #[test]
    fn test_missing_token_is_error() {
        assert!(config_from(&[("OPENAI_API_KEY", "sk-test")]).is_err());
    }

    #[test]
    fn test_bad_number_names_key() {
        let err = config_from(&[("TELEGRAM_TOKEN", "t"), ("DEFAULT_SLIPPAGE_BPS", "one")]).unwrap_err();
        assert!(err.to_string().contains("DEFAULT_SLIPPAGE_BPS"));
    }

    #[test]
    fn test_allow_list() {
        let open = config_from(&[("TELEGRAM_TOKEN", "t")]).unwrap();
        assert!(open.is_authorized(42));

        let restricted = config_from(&[("TELEGRAM_TOKEN", "t"), ("TELEGRAM_ALLOWED_USERS", "1, 2,3")]).unwrap();
        assert_eq!(restricted.authorized_users, vec![1, 2, 3]);
        assert!(restricted.is_authorized(2));
        assert!(!restricted.is_authorized(42));

        assert!(config_from(&[("TELEGRAM_TOKEN", "t"), ("TELEGRAM_ALLOWED_USERS", "1,x")]).is_err());
    }

    #[test]
    fn test_demo_mode_flag() {
        let config = config_from(&[("TELEGRAM_TOKEN", "t"), ("DEMO_MODE", "TRUE")]).unwrap();
        assert!(config.demo_mode);
    }
}
