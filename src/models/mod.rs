pub mod token;

// Re-export commonly used types
pub use token::{Pair, TokenInfo};
