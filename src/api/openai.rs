use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::BotError;

const SYSTEM_PROMPT: &str = "You are a helpful crypto assistant. You are concise and always answer in at most 6 sentences. \
When the user asks about a token, use the real-time token data from DexScreener provided below to answer accurately and concisely. \
If the user asks about a token, always include the latest price, liquidity, 24h volume, and DEX link from the provided data. \
If the user asks something else, answer normally.";

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, max_tokens: u32) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .context("Failed to create HTTP client for OpenAI")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        })
    }

    /// Answers a chat message. Failures come back as `Error: ...` so the
    /// caller can forward the text as-is.
    pub async fn chat(&self, user_message: &str, token_context: Option<&str>) -> String {
        match self.complete(user_message, token_context).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("OpenAI chat completion failed: {:#}", e);
                format!("Error: {}", e)
            }
        }
    }

    async fn complete(&self, user_message: &str, token_context: Option<&str>) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: build_messages(user_message, token_context),
            max_tokens: self.max_tokens,
        };
        debug!("Sending chat completion ({} chars, context: {})", user_message.len(), token_context.is_some());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BotError::ApiError(format!("OpenAI API failed with status {}: {}", status, error_text)).into());
        }

        let body: ChatResponse = response.json().await.context("Failed to parse OpenAI response")?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| BotError::ApiError("OpenAI returned no choices".to_string()).into())
    }
}

fn build_messages(user_message: &str, token_context: Option<&str>) -> Vec<ChatMessage> {
    let system = match token_context {
        Some(data) => format!("{}\n\nToken Data:\n{}", SYSTEM_PROMPT, data),
        None => SYSTEM_PROMPT.to_string(),
    };
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: system,
        },
        ChatMessage {
            role: "user".to_string(),
            content: user_message.to_string(),
        },
    ]
}

/// First word of `text` that is a valid Solana address.
pub fn extract_token_address(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|word| (32..=44).contains(&word.len()))
        .find(|word| Pubkey::from_str(word).is_ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_extract_token_address() {
        assert_eq!(
            extract_token_address("what about DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263?"),
            Some("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263".to_string())
        );
        assert_eq!(extract_token_address("hello there"), None);
        // Right length, not base58
        assert_eq!(extract_token_address("0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl"), None);
    }

    #[test]
    fn test_context_goes_into_system_prompt() {
        let messages = build_messages("price?", Some("💊 Bonk"));
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.ends_with("Token Data:\n💊 Bonk"));
        assert_eq!(messages[1], ChatMessage { role: "user".into(), content: "price?".into() });

        let plain = build_messages("hi", None);
        assert!(!plain[0].content.contains("Token Data"));
    }

    #[tokio::test]
    async fn test_chat_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 500,
                "messages": [{ "role": "system" }, { "role": "user", "content": "gm" }]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"index":0,"message":{"role":"assistant","content":" gm! "}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), "sk-test", "gpt-3.5-turbo", 500).unwrap();
        assert_eq!(client.chat("gm", None).await, "gm!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_error_becomes_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), "bad", "gpt-3.5-turbo", 500).unwrap();
        let reply = client.chat("gm", None).await;
        assert!(reply.starts_with("Error: "));
        assert!(reply.contains("Incorrect API key"));
    }
}
