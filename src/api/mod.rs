pub mod dexscreener;
pub mod jupiter;
pub mod openai;

pub use dexscreener::{DexScreenerClient, RetryPolicy};
pub use jupiter::JupiterClient;
pub use openai::OpenAiClient;
