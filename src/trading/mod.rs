pub mod executor;
pub mod flow;

pub use executor::TradeExecutor;
