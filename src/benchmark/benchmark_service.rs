use std::sync::Arc;

use rust_decimal::Decimal;

use crate::errors::Result;
use crate::market_data::PricePair;

use super::basket_math;
use super::benchmark_errors::BenchmarkError;
use super::benchmark_model::BenchmarkState;
use super::benchmark_traits::BenchmarkStoreTrait;

/// Read-side interface consumed by the NAV recorder and downstream fee
/// calculation.
pub struct BenchmarkService {
    store: Arc<dyn BenchmarkStoreTrait>,
}

impl BenchmarkService {
    pub fn new(store: Arc<dyn BenchmarkStoreTrait>) -> Self {
        Self { store }
    }

    pub fn get_state_snapshot(&self, account_id: &str) -> Result<Option<BenchmarkState>> {
        self.store.get(account_id)
    }

    /// USD value of the account's benchmark basket at the given prices.
    pub fn get_benchmark_value(&self, account_id: &str, prices: &PricePair) -> Result<Decimal> {
        let state = self
            .store
            .get(account_id)?
            .ok_or_else(|| BenchmarkError::NotInitialized(account_id.to_string()))?;

        Ok(basket_math::market_value(&state.units(), prices))
    }
}
