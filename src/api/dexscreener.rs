use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::models::{Pair, TokenInfo};

pub const DEXSCREENER_BASE_URL: &str = "https://api.dexscreener.com/latest";

/// Thresholds of the honeypot heuristic.
const MAX_TAX_PERCENT: f64 = 10.0;
const MIN_LIQUIDITY_USD: f64 = 1000.0;

/// Timing of `get_token_info` retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// A 429 on attempt `n` waits `backoff_base * 2^n`.
    pub backoff_base: Duration,
    /// Pause after an attempt that found nothing.
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    fn rate_limit_wait(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base: Duration::from_secs(1),
            pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to create HTTP client for DexScreener")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn pairs_url(&self, address: &str) -> String {
        format!("{}/dex/pairs/solana/{}", self.base_url, address)
    }

    fn search_url(&self, address: &str) -> String {
        format!("{}/dex/search/?q={}", self.base_url, address)
    }

    fn tokens_url(&self, address: &str) -> String {
        format!("{}/dex/tokens/{}", self.base_url, address)
    }

    /// Looks a token up across the pair, search and token endpoints.
    /// Returns `None` once every attempt is exhausted.
    pub async fn get_token_info(&self, token_address: &str) -> Option<TokenInfo> {
        let token_address = token_address.trim();
        for attempt in 0..self.retry.attempts {
            match self.try_endpoints(token_address, attempt).await {
                Ok(Some(info)) => return Some(info),
                Ok(None) => {
                    debug!("No pairs for {} on attempt {}", token_address, attempt + 1);
                    tokio::time::sleep(self.retry.pause).await;
                }
                Err(e) => {
                    error!("Error fetching token info for {}: {:#}", token_address, e);
                    if attempt + 1 < self.retry.attempts {
                        tokio::time::sleep(self.retry.pause).await;
                    }
                }
            }
        }
        warn!("Giving up on token info for {} after {} attempts", token_address, self.retry.attempts);
        None
    }

    async fn try_endpoints(&self, token_address: &str, attempt: u32) -> Result<Option<TokenInfo>> {
        let endpoints = [
            self.pairs_url(token_address),
            self.search_url(token_address),
            self.tokens_url(token_address),
        ];

        for endpoint in endpoints.iter() {
            info!("Trying endpoint: {}", endpoint);
            let response = self
                .client
                .get(endpoint)
                .send()
                .await
                .context("Failed to send request to DexScreener")?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let wait = self.retry.rate_limit_wait(attempt);
                warn!("Rate limited. Waiting {:?}...", wait);
                tokio::time::sleep(wait).await;
                continue;
            }

            if response.status() == StatusCode::OK {
                let body: Value = response
                    .json()
                    .await
                    .context("Failed to parse DexScreener response")?;
                if let Some(info) = TokenInfo::from_value(&body) {
                    return Ok(Some(info));
                }
            }
        }
        Ok(None)
    }

    /// Runs the honeypot heuristic on the token's first pair and returns the
    /// user-facing verdict.
    pub async fn check_honeypot(&self, token_address: &str) -> String {
        let token_address = token_address.trim();
        let response = match self.client.get(self.pairs_url(token_address)).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("Error checking honeypot for {}: {}", token_address, e);
                return "Error occurred during honeypot check.".to_string();
            }
        };

        if !response.status().is_success() {
            return "Could not fetch token info for honeypot check.".to_string();
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                error!("Error checking honeypot for {}: {}", token_address, e);
                return "Error occurred during honeypot check.".to_string();
            }
        };

        // The pairs endpoint wants a pair address; a mint finds its pairs on the tokens endpoint
        let info = match TokenInfo::from_value(&body) {
            Some(info) => Some(info),
            None => self.fetch_single(&self.tokens_url(token_address)).await,
        };

        match info.as_ref().and_then(TokenInfo::first_pair) {
            Some(pair) => HoneypotReport::assess(pair).to_string(),
            None => "No trading pairs found for this token.".to_string(),
        }
    }

    async fn fetch_single(&self, url: &str) -> Option<TokenInfo> {
        let response = self.client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: Value = response.json().await.ok()?;
        TokenInfo::from_value(&body)
    }
}

/// Outcome of the static honeypot heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct HoneypotReport {
    pub warnings: Vec<String>,
}

impl HoneypotReport {
    pub fn assess(pair: &Pair) -> Self {
        let mut warnings = Vec::new();

        let buy_tax = pair.buy_tax.unwrap_or(0.0);
        let sell_tax = pair.sell_tax.unwrap_or(0.0);
        if buy_tax > MAX_TAX_PERCENT {
            // Taxes always show a fractional part, 25 -> "25.0"
            warnings.push(format!("High buy tax: {:?}%", buy_tax));
        }
        if sell_tax > MAX_TAX_PERCENT {
            warnings.push(format!("High sell tax: {:?}%", sell_tax));
        }

        let liquidity = pair.liquidity_usd().unwrap_or(0.0);
        if liquidity < MIN_LIQUIDITY_USD {
            warnings.push(format!("Very low liquidity: ${}", liquidity));
        }

        if !pair.liquidity_locked() {
            warnings.push("Liquidity is not locked".to_string());
        }

        Self { warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl fmt::Display for HoneypotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            write!(f, "✅ No obvious risks detected (always DYOR)")
        } else {
            write!(f, "⚠️ Potential risks detected:\n• {}", self.warnings.join("\n• "))
        }
    }
}

/// Human-readable summary of the token's first pair.
pub fn format_token_info(info: &TokenInfo) -> String {
    format_token_info_at(info, Utc::now())
}

fn format_token_info_at(info: &TokenInfo, now: DateTime<Utc>) -> String {
    let pair = match info.first_pair() {
        Some(p) => p,
        None => return "Could not find token information.".to_string(),
    };

    let fdv = format_usd(Some(pair.fdv.unwrap_or(0.0)));
    let liquidity = format_usd(Some(pair.liquidity_usd().unwrap_or(0.0)));
    let price = format_usd(pair.price_usd);
    let volume = format_usd(pair.volume_h24());

    let change = pair.price_change.as_ref();
    let change_15m = change.and_then(|c| c.m15).unwrap_or(0.0);
    let change_24h = change.and_then(|c| c.h24).unwrap_or(0.0);
    let trend_emoji = if change_15m > 0.0 {
        "📈"
    } else if change_15m < 0.0 {
        "📉"
    } else {
        "➡️"
    };

    let age = pair
        .pair_created_at
        .map(|ms| format_age(ms, now))
        .unwrap_or_else(|| "Unknown".to_string());
    let holders = pair
        .holders_count
        .map(|h| format!("{}", h.round() as u64))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "💊 {} ({})\n\
         🌐 {} @ {}\n\
         💰 USD: {}\n\n\
         💎 FDV: {}\n\n\
         💦 Liq: {}\n\n\
         📊 Vol: {} ⋅ Age: {}\n\n\
         {} 15m: {}%\n\n\
         📈 24h: {}%\n\n\
         👥 Holders: {}\n\n\
         🔒 LP Locked: {}",
        pair.base_token_name().unwrap_or("Unknown"),
        pair.url.as_deref().unwrap_or("N/A"),
        pair.chain_id.as_deref().unwrap_or("Solana"),
        pair.dex_id.as_deref().unwrap_or("Unknown"),
        price,
        fdv,
        liquidity,
        volume,
        age,
        trend_emoji,
        format_sig3(change_15m),
        format_sig3(change_24h),
        holders,
        if pair.liquidity_locked() { "Yes" } else { "No" },
    )
}

/// Dollar amount with three significant figures and a B/M/K suffix.
pub fn format_usd(value: Option<f64>) -> String {
    let num = match value {
        Some(v) if v.is_finite() => v,
        _ => return "N/A".to_string(),
    };
    if num >= 1e9 {
        format!("${}B", format_sig3(num / 1e9))
    } else if num >= 1e6 {
        format!("${}M", format_sig3(num / 1e6))
    } else if num >= 1e3 {
        format!("${}K", format_sig3(num / 1e3))
    } else {
        format!("${}", format_sig3(num))
    }
}

/// `%.3g`: three significant digits, trailing zeros dropped, scientific
/// notation for exponents below -4 or above 2.
pub fn format_sig3(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let scientific = format!("{:.2e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };

    if exponent < -4 || exponent >= 3 {
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        let decimals = (2 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value))
    }
}

fn strip_trailing_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// Compact age of a pair created at `created_ms` (Unix millis).
pub fn format_age(created_ms: i64, now: DateTime<Utc>) -> String {
    let created = match Utc.timestamp_millis_opt(created_ms).single() {
        Some(t) => t,
        None => return "Unknown".to_string(),
    };
    let elapsed = now.signed_duration_since(created);
    if elapsed.num_seconds() < 0 {
        return "Unknown".to_string();
    }

    let days = elapsed.num_days();
    let hours = elapsed.num_hours() % 24;
    let minutes = elapsed.num_minutes() % 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
