use async_trait::async_trait;

use super::market_data_errors::MarketDataError;
use super::market_data_model::PriceMap;

/// Contract for current-price lookups. Implementations return partial maps
/// when only some symbols resolve and fail with `PriceUnavailable` only when
/// nothing resolves at all.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_prices(&self, symbols: &[String]) -> Result<PriceMap, MarketDataError>;
}
