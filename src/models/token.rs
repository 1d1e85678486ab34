use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Market data for a token as returned by DexScreener. Only `pairs` is read;
/// the rest of the payload is ignored.
#[derive(Debug, Clone, Default)]
pub struct TokenInfo {
    pub pairs: Vec<Pair>,
}

impl TokenInfo {
    /// Parses a raw DexScreener response. Pairs that cannot be read are
    /// dropped. Returns `None` when no usable pair remains.
    pub fn from_value(value: &Value) -> Option<Self> {
        let pairs: Vec<Pair> = value
            .get("pairs")?
            .as_array()?
            .iter()
            .filter_map(|raw| serde_json::from_value::<Pair>(raw.clone()).ok())
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(Self { pairs })
        }
    }

    pub fn first_pair(&self) -> Option<&Pair> {
        self.pairs.first()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    #[serde(default, deserialize_with = "lenient_string")]
    pub chain_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dex_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default)]
    pub base_token: Option<PairToken>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fdv: Option<f64>,
    #[serde(default)]
    pub liquidity: Option<Liquidity>,
    #[serde(default)]
    pub volume: Option<TimeWindows>,
    #[serde(default)]
    pub price_change: Option<TimeWindows>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub pair_created_at: Option<i64>, // Unix millis
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buy_tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sell_tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub holders_count: Option<f64>,
}

impl Pair {
    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }

    pub fn liquidity_locked(&self) -> bool {
        self.liquidity.as_ref().and_then(|l| l.locked).unwrap_or(false)
    }

    pub fn volume_h24(&self) -> Option<f64> {
        self.volume.as_ref().and_then(|v| v.h24)
    }

    pub fn base_token_name(&self) -> Option<&str> {
        self.base_token.as_ref().and_then(|t| t.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairToken {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Liquidity {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub locked: Option<bool>,
}

/// Per-window figures used for both `volume` and `priceChange`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeWindows {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub m15: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h24: Option<f64>,
}

// DexScreener mixes numbers and numeric strings; anything else reads as None.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pair_parsing_mixed_types() {
        let raw = json!({
            "pairs": [{
                "chainId": "solana",
                "dexId": "raydium",
                "url": "https://dexscreener.com/solana/abc",
                "baseToken": { "address": "Mint111", "name": "Test Token", "symbol": "TEST" },
                "priceUsd": "0.00123",
                "fdv": 2500000,
                "liquidity": { "usd": "15432.5", "locked": true },
                "volume": { "h24": 98765.4 },
                "priceChange": { "m15": -1.5, "h24": "12.25" },
                "pairCreatedAt": 1700000000000u64,
                "buyTax": "5",
                "holdersCount": 321
            }]
        });

        let info = TokenInfo::from_value(&raw).unwrap();
        let pair = info.first_pair().unwrap();
        assert_eq!(pair.chain_id.as_deref(), Some("solana"));
        assert_eq!(pair.base_token_name(), Some("Test Token"));
        assert_eq!(pair.price_usd, Some(0.00123));
        assert_eq!(pair.fdv, Some(2_500_000.0));
        assert_eq!(pair.liquidity_usd(), Some(15432.5));
        assert!(pair.liquidity_locked());
        assert_eq!(pair.volume_h24(), Some(98765.4));
        assert_eq!(pair.price_change.as_ref().unwrap().h24, Some(12.25));
        assert_eq!(pair.pair_created_at, Some(1_700_000_000_000));
        assert_eq!(pair.buy_tax, Some(5.0));
        assert_eq!(pair.sell_tax, None);
        assert_eq!(pair.holders_count, Some(321.0));
    }

    #[test]
    fn test_garbage_fields_become_none() {
        let raw = json!({
            "pairs": [{
                "priceUsd": "n/a",
                "liquidity": { "usd": null, "locked": "maybe" },
                "fdv": { "nested": 1 }
            }]
        });

        let pair = TokenInfo::from_value(&raw).unwrap().pairs.remove(0);
        assert_eq!(pair.price_usd, None);
        assert_eq!(pair.liquidity_usd(), None);
        assert!(!pair.liquidity_locked());
        assert_eq!(pair.fdv, None);
    }

    #[test]
    fn test_empty_or_missing_pairs() {
        assert!(TokenInfo::from_value(&json!({ "pairs": [] })).is_none());
        assert!(TokenInfo::from_value(&json!({ "pairs": null })).is_none());
        assert!(TokenInfo::from_value(&json!({ "schemaVersion": "1.0.0" })).is_none());
        assert!(TokenInfo::from_value(&json!([])).is_none());
    }
}
