pub mod market_data_errors;
pub mod market_data_model;
pub mod market_data_service;
pub mod market_data_traits;
pub mod providers;

pub use market_data_errors::MarketDataError;
pub use market_data_model::{PriceMap, PricePair};
pub use market_data_service::{FallbackPriceOracle, OracleService};
pub use market_data_traits::PriceOracle;
