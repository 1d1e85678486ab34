pub mod client;
pub mod wallet;

