use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::BotError;

pub const JUPITER_BASE_URL: &str = "https://quote-api.jup.ag/v6";
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone)]
pub struct JupiterClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub input_mint: String,
    pub in_amount: String,
    pub output_mint: String,
    pub out_amount: String,
    pub other_amount_threshold: String,
    pub swap_mode: String,
    pub slippage_bps: u32,
    #[serde(default)]
    pub price_impact_pct: Option<String>,
    #[serde(default)]
    pub route_plan: Vec<RoutePlan>,
    /// Fields this crate does not read, echoed back to `/swap` untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuoteResponse {
    pub fn out_amount_base_units(&self) -> Result<u64> {
        self.out_amount
            .parse::<u64>()
            .context("Failed to parse quote out_amount")
    }

    pub fn price_impact(&self) -> f64 {
        self.price_impact_pct
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// DEX labels along the route, e.g. "Raydium -> Orca".
    pub fn route_labels(&self) -> String {
        self.route_plan
            .iter()
            .map(|step| step.swap_info.label.as_deref().unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub swap_info: SwapInfo,
    pub percent: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    pub amm_key: String,
    #[serde(default)]
    pub label: Option<String>,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    quote_response: &'a QuoteResponse,
    user_public_key: &'a str,
    wrap_and_unwrap_sol: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    compute_unit_price_micro_lamports: Option<u64>,
    dynamic_compute_unit_limit: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    /// Base64 of a bincode-serialized unsigned `VersionedTransaction`.
    pub swap_transaction: String,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
    #[serde(default)]
    pub prioritization_fee_lamports: Option<u64>,
}

// v6 answers with the quote itself; some deployments wrap it in `data`
#[derive(Debug, Deserialize)]
struct QuoteResponseWrapper {
    data: Vec<QuoteResponse>,
}

impl JupiterClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to create HTTP client for Jupiter")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn with_key(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Jupiter-API-Key", key),
            None => builder,
        }
    }

    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<QuoteResponse> {
        let url = format!("{}/quote", self.base_url);
        let params = [
            ("inputMint", input_mint.to_string()),
            ("outputMint", output_mint.to_string()),
            ("amount", amount.to_string()),
            ("slippageBps", slippage_bps.to_string()),
        ];
        debug!("Getting quote from Jupiter: {:?}", params);

        let response = self
            .with_key(self.client.get(&url).query(&params))
            .send()
            .await
            .context("Failed to send quote request to Jupiter API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Jupiter Quote API error: Status {}, Body: {}", status, error_text);
            return Err(BotError::ApiError(format!(
                "Jupiter Quote API failed with status {}: {}",
                status, error_text
            ))
            .into());
        }

        let body = response
            .text()
            .await
            .context("Failed to read Jupiter Quote API response body")?;
        let quote = match serde_json::from_str::<QuoteResponseWrapper>(&body) {
            Ok(wrapper) => wrapper
                .data
                .into_iter()
                .next()
                .ok_or_else(|| BotError::ApiError("Jupiter Quote API returned empty data".to_string()))?,
            Err(_) => serde_json::from_str::<QuoteResponse>(&body)
                .context("Failed to parse Jupiter Quote API response")?,
        };

        if quote.in_amount.parse::<u64>().unwrap_or(0) == 0 || quote.out_amount.parse::<u64>().unwrap_or(0) == 0 {
            warn!("Received quote with zero in/out amount: {:?}", quote);
            return Err(BotError::ApiError("Received invalid quote from Jupiter (zero amount)".to_string()).into());
        }

        info!(
            "Quote {} {} -> {} {} via {}",
            quote.in_amount,
            quote.input_mint,
            quote.out_amount,
            quote.output_mint,
            quote.route_labels()
        );
        Ok(quote)
    }

    pub async fn get_swap_transaction(
        &self,
        quote: &QuoteResponse,
        user_public_key: &str,
        priority_fee_micro_lamports: Option<u64>,
    ) -> Result<SwapResponse> {
        let url = format!("{}/swap", self.base_url);
        let request_body = SwapRequest {
            quote_response: quote,
            user_public_key,
            wrap_and_unwrap_sol: true,
            compute_unit_price_micro_lamports: priority_fee_micro_lamports,
            dynamic_compute_unit_limit: true,
        };
        debug!("Requesting swap transaction for {}", user_public_key);

        let response = self
            .with_key(self.client.post(&url).json(&request_body))
            .send()
            .await
            .context("Failed to send swap request to Jupiter API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Jupiter Swap API error: Status {}, Body: {}", status, error_text);
            return Err(BotError::ApiError(format!(
                "Jupiter Swap API failed with status {}: {}",
                status, error_text
            ))
            .into());
        }

        let swap_response: SwapResponse = response
            .json()
            .await
            .context("Failed to parse Jupiter Swap API response")?;
        debug!(
            "Received swap transaction ({} base64 chars, last valid block height {:?})",
            swap_response.swap_transaction.len(),
            swap_response.last_valid_block_height
        );
        Ok(swap_response)
    }

    /// USD price of `mint`. Any failure is logged and reads as 0.0.
    pub async fn get_price(&self, mint: &str) -> f64 {
        match self.fetch_price(mint).await {
            Ok(price) => price,
            Err(e) => {
                error!("Error getting token price for {}: {:#}", mint, e);
                0.0
            }
        }
    }

    async fn fetch_price(&self, mint: &str) -> Result<f64> {
        let url = format!("{}/price", self.base_url);
        let response = self
            .with_key(self.client.get(&url).query(&[("ids", mint)]))
            .send()
            .await
            .context("Failed to send price request to Jupiter API")?;

        if !response.status().is_success() {
            warn!("Jupiter price API returned {} for {}", response.status(), mint);
            return Ok(0.0);
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse Jupiter price response")?;
        let price = match body.get("data").and_then(|d| d.get(mint)).and_then(|t| t.get("price")) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.parse::<f64>().context("Price is not a number")?,
            _ => 0.0,
        };
        debug!("Jupiter price for {}: {}", mint, price);
        Ok(price)
    }
}

/// Decodes the unsigned transaction inside a swap response.
pub fn decode_swap_transaction(swap: &SwapResponse) -> Result<VersionedTransaction> {
    let transaction_bytes = STANDARD
        .decode(swap.swap_transaction.trim())
        .context("Failed to decode swap transaction")?;
    let transaction: VersionedTransaction =
        bincode::deserialize(&transaction_bytes).context("Failed to deserialize VersionedTransaction")?;
    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use solana_sdk::{
        hash::Hash,
        message::{Message, VersionedMessage},
        pubkey::Pubkey,
        signature::Signature,
        system_instruction,
    };

    const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    fn quote_json(out_amount: &str) -> Value {
        json!({
            "inputMint": SOL_MINT,
            "inAmount": "100000000",
            "outputMint": BONK,
            "outAmount": out_amount,
            "otherAmountThreshold": "990000",
            "swapMode": "ExactIn",
            "slippageBps": 100,
            "priceImpactPct": "0.0125",
            "routePlan": [{
                "swapInfo": {
                    "ammKey": "amm1",
                    "label": "Raydium",
                    "inputMint": SOL_MINT,
                    "outputMint": BONK,
                    "inAmount": "100000000",
                    "outAmount": out_amount,
                    "feeAmount": "25000",
                    "feeMint": SOL_MINT
                },
                "percent": 100
            }],
            "contextSlot": 12345
        })
    }

    async fn client_for(server: &mockito::ServerGuard) -> JupiterClient {
        JupiterClient::new(&server.url(), None).unwrap()
    }

    #[tokio::test]
    async fn test_get_quote() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("inputMint".into(), SOL_MINT.into()),
                Matcher::UrlEncoded("outputMint".into(), BONK.into()),
                Matcher::UrlEncoded("amount".into(), "100000000".into()),
                Matcher::UrlEncoded("slippageBps".into(), "100".into()),
            ]))
            .with_status(200)
            .with_body(quote_json("1000000").to_string())
            .create_async()
            .await;

        let quote = client_for(&server).await.get_quote(SOL_MINT, BONK, 100_000_000, 100).await.unwrap();
        assert_eq!(quote.out_amount_base_units().unwrap(), 1_000_000);
        assert_eq!(quote.price_impact(), 0.0125);
        assert_eq!(quote.route_labels(), "Raydium");
        assert_eq!(quote.extra.get("contextSlot"), Some(&json!(12345)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_quote_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("amount".into(), "1".into()))
            .with_status(400)
            .with_body(r#"{"error":"Could not find any route"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("amount".into(), "2".into()))
            .with_status(200)
            .with_body(quote_json("0").to_string())
            .create_async()
            .await;

        let client = client_for(&server).await;
        let err = client.get_quote(SOL_MINT, BONK, 1, 100).await.unwrap_err();
        assert!(err.to_string().contains("Could not find any route"));
        let err = client.get_quote(SOL_MINT, BONK, 2, 100).await.unwrap_err();
        assert!(err.to_string().contains("zero amount"));
    }

    #[tokio::test]
    async fn test_swap_request_echoes_quote() {
        let mut server = mockito::Server::new_async().await;
        let user = Pubkey::new_unique().to_string();
        let mock = server
            .mock("POST", "/swap")
            .match_body(Matcher::PartialJson(json!({
                "userPublicKey": user,
                "wrapAndUnwrapSol": true,
                "computeUnitPriceMicroLamports": 5000,
                "quoteResponse": { "outAmount": "1000000", "contextSlot": 12345 }
            })))
            .with_status(200)
            .with_body(r#"{"swapTransaction":"AQID","lastValidBlockHeight":99}"#)
            .create_async()
            .await;

        let quote: QuoteResponse = serde_json::from_value(quote_json("1000000")).unwrap();
        let swap = client_for(&server)
            .await
            .get_swap_transaction(&quote, &user, Some(5000))
            .await
            .unwrap();
        assert_eq!(swap.swap_transaction, "AQID");
        assert_eq!(swap.last_valid_block_height, Some(99));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_price_reads_data_and_defaults_to_zero() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/price")
            .match_query(Matcher::UrlEncoded("ids".into(), BONK.into()))
            .with_status(200)
            .with_body(json!({ "data": { BONK: { "id": BONK, "price": 0.0000231 } } }).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/price")
            .match_query(Matcher::UrlEncoded("ids".into(), SOL_MINT.into()))
            .with_status(200)
            .with_body(r#"{"data": {}}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.get_price(BONK).await, 0.0000231);
        assert_eq!(client.get_price(SOL_MINT).await, 0.0);

        // Unreachable endpoint
        let offline = JupiterClient::new("http://127.0.0.1:1", None).unwrap();
        assert_eq!(offline.get_price(BONK).await, 0.0);
    }

    #[test]
    fn test_decode_swap_transaction() {
        let payer = Pubkey::new_unique();
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 10);
        let mut message = Message::new(&[ix], Some(&payer));
        message.recent_blockhash = Hash::new_unique();
        let tx = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(message),
        };
        let swap = SwapResponse {
            swap_transaction: STANDARD.encode(bincode::serialize(&tx).unwrap()),
            last_valid_block_height: None,
            prioritization_fee_lamports: None,
        };

        let decoded = decode_swap_transaction(&swap).unwrap();
        assert_eq!(decoded.message.static_account_keys()[0], payer);
        assert_eq!(decoded.signatures.len(), 1);

        let garbage = SwapResponse {
            swap_transaction: "not base64!".to_string(),
            last_valid_block_height: None,
            prioritization_fee_lamports: None,
        };
        assert!(decode_swap_transaction(&garbage).is_err());
    }
}
