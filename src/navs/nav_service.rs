use std::sync::Arc;

use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::context::ServiceContext;
use crate::errors::Result;
use crate::market_data::PricePair;

use super::nav_model::NavSnapshot;
use super::nav_traits::NavRepositoryTrait;

/// Thin recorder for the (NAV, benchmark value, prices, timestamp) series.
pub struct NavService {
    repository: Arc<dyn NavRepositoryTrait>,
    ctx: ServiceContext,
}

impl NavService {
    pub fn new(repository: Arc<dyn NavRepositoryTrait>, ctx: ServiceContext) -> Self {
        Self { repository, ctx }
    }

    pub fn record(
        &self,
        account_id: &str,
        nav_usd: Decimal,
        benchmark_value_usd: Decimal,
        prices: &PricePair,
    ) -> Result<NavSnapshot> {
        let snapshot = NavSnapshot {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            recorded_at: self.ctx.now(),
            nav_usd,
            benchmark_value_usd,
            btc_price: prices.btc,
            eth_price: prices.eth,
        };
        self.repository.append(&snapshot)?;

        debug!(
            "Recorded NAV snapshot for account {}: nav={} benchmark={}",
            account_id, nav_usd, benchmark_value_usd
        );
        Ok(snapshot)
    }

    pub fn get_history(&self, account_id: &str) -> Result<Vec<NavSnapshot>> {
        self.repository.get_history(account_id)
    }

    pub fn get_latest(&self, account_id: &str) -> Result<Option<NavSnapshot>> {
        self.repository.get_latest(account_id)
    }
}
