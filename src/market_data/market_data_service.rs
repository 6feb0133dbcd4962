use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::constants::{BTC_SYMBOL, ETH_SYMBOL};
use crate::context::ServiceContext;
use crate::errors::Result;
use crate::utils::retry::with_retry;

use super::market_data_errors::MarketDataError;
use super::market_data_model::{PriceMap, PricePair};
use super::market_data_traits::PriceOracle;

/// Ordered provider chain. Later providers only fill symbols the earlier
/// ones left unresolved; the chain fails only when the merged map is empty.
pub struct FallbackPriceOracle {
    providers: Vec<Arc<dyn PriceOracle>>,
}

impl FallbackPriceOracle {
    pub fn new(providers: Vec<Arc<dyn PriceOracle>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl PriceOracle for FallbackPriceOracle {
    async fn get_prices(&self, symbols: &[String]) -> std::result::Result<PriceMap, MarketDataError> {
        let mut merged = PriceMap::new();

        for provider in &self.providers {
            let missing: Vec<String> = symbols
                .iter()
                .filter(|s| !merged.contains_key(*s))
                .cloned()
                .collect();
            if missing.is_empty() {
                break;
            }

            match provider.get_prices(&missing).await {
                Ok(prices) => {
                    debug!("Price provider resolved {} of {} symbols", prices.len(), missing.len());
                    merged.extend(prices);
                }
                Err(e) => {
                    warn!("Price provider failed, trying next fallback: {}", e);
                }
            }
        }

        if merged.is_empty() {
            return Err(MarketDataError::PriceUnavailable);
        }
        Ok(merged)
    }
}

/// Engine-facing oracle wrapper enforcing the configured timeout and retry
/// bounds around every upstream call.
pub struct OracleService {
    oracle: Arc<dyn PriceOracle>,
    ctx: ServiceContext,
}

impl OracleService {
    pub fn new(oracle: Arc<dyn PriceOracle>, ctx: ServiceContext) -> Self {
        Self { oracle, ctx }
    }

    pub async fn get_prices(&self, symbols: &[String]) -> Result<PriceMap> {
        let config = &self.ctx.config;
        let prices = with_retry(
            "price oracle",
            config.oracle_retries,
            config.retry_backoff,
            || async {
                tokio::time::timeout(config.oracle_timeout, self.oracle.get_prices(symbols))
                    .await
                    .map_err(|_| {
                        MarketDataError::ProviderError(format!(
                            "timed out after {:?}",
                            config.oracle_timeout
                        ))
                    })?
            },
        )
        .await?;
        Ok(prices)
    }

    /// Fetches the basket pair; a missing BTC or ETH price surfaces as
    /// `PriceUnavailable` so callers skip the tick instead of computing
    /// against a partial pair.
    pub async fn get_price_pair(&self) -> Result<PricePair> {
        let symbols = vec![BTC_SYMBOL.to_string(), ETH_SYMBOL.to_string()];
        let prices = self.get_prices(&symbols).await?;
        PricePair::from_map(&prices).ok_or_else(|| MarketDataError::PriceUnavailable.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct StaticProvider {
        prices: Vec<(&'static str, Decimal)>,
        available: bool,
    }

    #[async_trait]
    impl PriceOracle for StaticProvider {
        async fn get_prices(&self, symbols: &[String]) -> std::result::Result<PriceMap, MarketDataError> {
            if !self.available {
                return Err(MarketDataError::ProviderError("connection reset".to_string()));
            }
            let found: PriceMap = self
                .prices
                .iter()
                .filter(|(s, _)| symbols.iter().any(|wanted| wanted == s))
                .map(|(s, p)| (s.to_string(), *p))
                .collect();
            if found.is_empty() {
                return Err(MarketDataError::PriceUnavailable);
            }
            Ok(found)
        }
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn later_providers_fill_missing_symbols() {
        let chain = FallbackPriceOracle::new(vec![
            Arc::new(StaticProvider {
                prices: vec![("BTC", dec!(65000))],
                available: true,
            }),
            Arc::new(StaticProvider {
                prices: vec![("BTC", dec!(1)), ("ETH", dec!(3500))],
                available: true,
            }),
        ]);

        let prices = chain.get_prices(&symbols(&["BTC", "ETH"])).await.unwrap();

        // The first provider's BTC price wins; the second only fills ETH
        assert_eq!(prices.get("BTC"), Some(&dec!(65000)));
        assert_eq!(prices.get("ETH"), Some(&dec!(3500)));
    }

    #[tokio::test]
    async fn broken_provider_falls_through_to_the_next() {
        let chain = FallbackPriceOracle::new(vec![
            Arc::new(StaticProvider {
                prices: vec![],
                available: false,
            }),
            Arc::new(StaticProvider {
                prices: vec![("BTC", dec!(65000)), ("ETH", dec!(3500))],
                available: true,
            }),
        ]);

        let prices = chain.get_prices(&symbols(&["BTC", "ETH"])).await.unwrap();
        assert_eq!(prices.len(), 2);
    }

    #[tokio::test]
    async fn empty_chain_result_is_price_unavailable() {
        let chain = FallbackPriceOracle::new(vec![Arc::new(StaticProvider {
            prices: vec![],
            available: false,
        })]);

        let result = chain.get_prices(&symbols(&["BTC"])).await;
        assert!(matches!(result, Err(MarketDataError::PriceUnavailable)));
    }
}
