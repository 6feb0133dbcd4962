use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::constants::USD_ASSETS;
use crate::market_data::market_data_errors::MarketDataError;
use crate::market_data::market_data_model::PriceMap;
use crate::market_data::market_data_traits::PriceOracle;

const DEFAULT_BASE_URL: &str = "https://api.coinbase.com";

#[derive(Deserialize, Debug)]
struct SpotPriceResponse {
    data: SpotPriceData,
}

#[derive(Deserialize, Debug)]
struct SpotPriceData {
    amount: String,
}

/// Current USD spot prices from a public exchange price endpoint.
/// One request per symbol; symbols that fail are skipped so partial
/// results still reach the caller.
pub struct SpotPriceProvider {
    client: reqwest::Client,
    base_url: String,
}

impl SpotPriceProvider {
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(MarketDataError::NetworkError)?;
        Ok(Self { client, base_url })
    }

    async fn fetch_spot(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        let url = format!("{}/v2/prices/{}-USD/spot", self.base_url, symbol);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::ProviderError(format!(
                "spot price request for {} returned {}",
                symbol,
                response.status()
            )));
        }

        let body: SpotPriceResponse = response.json().await?;
        Decimal::from_str(&body.data.amount).map_err(|e| {
            MarketDataError::ParsingError(format!(
                "invalid spot price '{}' for {}: {}",
                body.data.amount, symbol, e
            ))
        })
    }
}

#[async_trait]
impl PriceOracle for SpotPriceProvider {
    async fn get_prices(&self, symbols: &[String]) -> Result<PriceMap, MarketDataError> {
        let mut prices = PriceMap::new();

        for symbol in symbols {
            if USD_ASSETS.contains(&symbol.as_str()) {
                prices.insert(symbol.clone(), Decimal::ONE);
                continue;
            }

            match self.fetch_spot(symbol).await {
                Ok(price) => {
                    prices.insert(symbol.clone(), price);
                }
                Err(e) => {
                    warn!("Failed to fetch spot price for {}: {}", symbol, e);
                }
            }
        }

        if prices.is_empty() {
            return Err(MarketDataError::PriceUnavailable);
        }
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn usd_assets_short_circuit_to_one() {
        let provider =
            SpotPriceProvider::with_base_url("http://localhost:1".to_string()).unwrap();

        let symbols = vec!["USDT".to_string(), "USDC".to_string()];
        let prices = provider.get_prices(&symbols).await.unwrap();

        assert_eq!(prices.get("USDT"), Some(&dec!(1)));
        assert_eq!(prices.get("USDC"), Some(&dec!(1)));
    }
}
