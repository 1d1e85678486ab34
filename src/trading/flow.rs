//! Conversational trade flow.
//!
//! Each user in wallet mode may have one pending trade. Every text message
//! advances it by one step until an order is complete.

use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

use crate::api::jupiter::SOL_MINT;
use crate::error::BotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Buy,
    Sell,
    Swap,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::Buy => write!(f, "buy"),
            TradeKind::Sell => write!(f, "sell"),
            TradeKind::Swap => write!(f, "swap"),
        }
    }
}

/// What the flow waits for next, with the operands collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeStep {
    BuyToken,
    BuyAmount { token: String },
    SellToken,
    SellAmount { token: String },
    SwapFrom,
    SwapTo { from: String },
    SwapAmount { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Next { step: TradeStep, prompt: String },
    Ready(TradeOrder),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub kind: TradeKind,
    pub input_mint: String,
    pub output_mint: String,
    /// UI units of the input mint.
    pub amount: f64,
    /// Token whose market data is shown before the order is placed.
    pub info_token: String,
}

impl TradeStep {
    pub fn start(kind: TradeKind) -> (Self, &'static str) {
        match kind {
            TradeKind::Buy => (TradeStep::BuyToken, "Please enter the token address you want to buy:"),
            TradeKind::Sell => (TradeStep::SellToken, "Please enter the token address you want to sell:"),
            TradeKind::Swap => (TradeStep::SwapFrom, "Please enter the token address you want to swap from:"),
        }
    }

    pub fn kind(&self) -> TradeKind {
        match self {
            TradeStep::BuyToken | TradeStep::BuyAmount { .. } => TradeKind::Buy,
            TradeStep::SellToken | TradeStep::SellAmount { .. } => TradeKind::Sell,
            TradeStep::SwapFrom | TradeStep::SwapTo { .. } | TradeStep::SwapAmount { .. } => TradeKind::Swap,
        }
    }

    pub fn advance(self, input: &str) -> Result<StepOutcome, BotError> {
        let outcome = match self {
            TradeStep::BuyToken => {
                let token = parse_token_address(input)?;
                let prompt = format!("Enter the amount of SOL to spend on buying token {}:", token);
                StepOutcome::Next {
                    step: TradeStep::BuyAmount { token },
                    prompt,
                }
            }
            TradeStep::BuyAmount { token } => StepOutcome::Ready(TradeOrder {
                kind: TradeKind::Buy,
                input_mint: SOL_MINT.to_string(),
                output_mint: token.clone(),
                amount: parse_amount(input)?,
                info_token: token,
            }),
            TradeStep::SellToken => {
                let token = parse_token_address(input)?;
                let prompt = format!("Enter the amount of {} to sell:", token);
                StepOutcome::Next {
                    step: TradeStep::SellAmount { token },
                    prompt,
                }
            }
            TradeStep::SellAmount { token } => StepOutcome::Ready(TradeOrder {
                kind: TradeKind::Sell,
                input_mint: token.clone(),
                output_mint: SOL_MINT.to_string(),
                amount: parse_amount(input)?,
                info_token: token,
            }),
            TradeStep::SwapFrom => StepOutcome::Next {
                step: TradeStep::SwapTo {
                    from: parse_token_address(input)?,
                },
                prompt: "Enter the token address you want to swap to:".to_string(),
            },
            TradeStep::SwapTo { from } => {
                let to = parse_token_address(input)?;
                if to == from {
                    return Err(BotError::InvalidTokenAddress(
                        "Cannot swap a token into itself".to_string(),
                    ));
                }
                StepOutcome::Next {
                    step: TradeStep::SwapAmount { from, to },
                    prompt: "Enter the amount to swap:".to_string(),
                }
            }
            TradeStep::SwapAmount { from, to } => StepOutcome::Ready(TradeOrder {
                kind: TradeKind::Swap,
                input_mint: from,
                output_mint: to.clone(),
                amount: parse_amount(input)?,
                info_token: to,
            }),
        };
        Ok(outcome)
    }
}

impl TradeOrder {
    pub fn info_heading(&self) -> &'static str {
        match self.kind {
            TradeKind::Swap => "Token Data (to_token)",
            _ => "Token Data",
        }
    }

    pub fn announcement(&self) -> String {
        match self.kind {
            TradeKind::Buy => format!("Placing buy order for {} SOL...", self.amount),
            TradeKind::Sell => format!("Placing sell order for {} {}...", self.amount, self.input_mint),
            TradeKind::Swap => format!(
                "Placing swap order for {} from {} to {}...",
                self.amount, self.input_mint, self.output_mint
            ),
        }
    }

    pub fn success_message(&self) -> String {
        match self.kind {
            TradeKind::Buy => format!("Successfully bought {} SOL worth of token {}", self.amount, self.output_mint),
            TradeKind::Sell => format!("Successfully sold {} of token {}", self.amount, self.input_mint),
            TradeKind::Swap => format!(
                "Successfully swapped {} from {} to {}",
                self.amount, self.input_mint, self.output_mint
            ),
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self.kind {
            TradeKind::Buy => "Failed to execute buy order. Please try again.",
            TradeKind::Sell => "Failed to execute sell order. Please try again.",
            TradeKind::Swap => "Failed to execute swap. Please try again.",
        }
    }
}

pub fn parse_token_address(input: &str) -> Result<String, BotError> {
    let trimmed = input.trim();
    Pubkey::from_str(trimmed)
        .map(|pubkey| pubkey.to_string())
        .map_err(|_| BotError::InvalidTokenAddress(format!("'{}' is not a valid Solana address", trimmed)))
}

pub fn parse_amount(input: &str) -> Result<f64, BotError> {
    let trimmed = input.trim();
    let amount: f64 = trimmed
        .parse()
        .map_err(|_| BotError::InvalidAmount(format!("could not convert string to float: '{}'", trimmed)))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(BotError::InvalidAmount(format!("amount must be a positive number, got {}", trimmed)));
    }
    Ok(amount)
}
