use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{BTC_SYMBOL, ETH_SYMBOL};

/// Current USD prices keyed by symbol. Symbols that could not be resolved
/// are absent, never zero-filled.
pub type PriceMap = HashMap<String, Decimal>;

/// The basket's two prices, guaranteed present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePair {
    pub btc: Decimal,
    pub eth: Decimal,
}

impl PricePair {
    /// Builds the pair from a price map; None when either symbol is missing.
    pub fn from_map(prices: &PriceMap) -> Option<Self> {
        Some(Self {
            btc: *prices.get(BTC_SYMBOL)?,
            eth: *prices.get(ETH_SYMBOL)?,
        })
    }
}
