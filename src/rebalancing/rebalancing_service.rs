use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::benchmark::basket_math;
use crate::benchmark::{BenchmarkError, BenchmarkState, BenchmarkStoreTrait, Weights};
use crate::context::ServiceContext;
use crate::errors::Result;
use crate::ledger::{LedgerRepositoryTrait, RebalanceRecord, RebalanceStatus};
use crate::market_data::PricePair;

use super::schedule;

/// Weekly rebalancer. An account moves UNINITIALIZED -> ACTIVE once via
/// `initialize`, then `tick` resets the basket to target weights whenever
/// the scheduled slot has passed. Updates are all-or-nothing: a failed
/// attempt leaves the state and the schedule untouched and writes a FAILED
/// audit record so the slot retries next tick.
pub struct RebalancingService {
    store: Arc<dyn BenchmarkStoreTrait>,
    ledger: Arc<dyn LedgerRepositoryTrait>,
    ctx: ServiceContext,
}

impl RebalancingService {
    pub fn new(
        store: Arc<dyn BenchmarkStoreTrait>,
        ledger: Arc<dyn LedgerRepositoryTrait>,
        ctx: ServiceContext,
    ) -> Self {
        Self { store, ledger, ctx }
    }

    /// Splits the account's first NAV reading into basket units at the
    /// configured weights. Idempotent: an already-initialized account is
    /// returned as-is.
    pub fn initialize(
        &self,
        account_id: &str,
        nav_usd: Decimal,
        prices: &PricePair,
    ) -> Result<BenchmarkState> {
        if let Some(existing) = self.store.get(account_id)? {
            debug!("Account {} already initialized, skipping", account_id);
            return Ok(existing);
        }

        let config = &self.ctx.config;
        let weights = Weights {
            btc: config.btc_weight,
            eth: config.eth_weight,
        };
        let units = basket_math::initial_allocation(nav_usd, prices, &weights)?;

        let now = self.ctx.now();
        let state = BenchmarkState {
            account_id: account_id.to_string(),
            btc_units: units.btc,
            eth_units: units.eth,
            btc_weight: weights.btc,
            eth_weight: weights.eth,
            initial_nav_usd: Some(nav_usd),
            initial_btc_price: Some(prices.btc),
            initial_eth_price: Some(prices.eth),
            initialized_at: Some(now),
            next_rebalance_at: Some(schedule::next_occurrence_at_or_after(
                now,
                config.rebalance_weekday,
                config.rebalance_hour,
            )),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_initial(&state)?;

        // The NAV already contains every prior cashflow; ingesting history
        // from before this instant would double-count it.
        self.ledger.advance_checkpoint(account_id, now)?;

        info!(
            "Initialized benchmark for account {}: NAV {} USD -> {} BTC + {} ETH, next rebalance {:?}",
            account_id, nav_usd, state.btc_units, state.eth_units, state.next_rebalance_at
        );
        Ok(state)
    }

    /// Executes the scheduled rebalance if one is due. Returns None when
    /// the account is uninitialized or the slot has not arrived yet.
    pub fn tick(&self, account_id: &str, prices: &PricePair) -> Result<Option<RebalanceRecord>> {
        for attempt in 0..2 {
            let Some(state) = self.store.get(account_id)? else {
                return Ok(None);
            };
            let Some(due_at) = state.next_rebalance_at else {
                return Ok(None);
            };
            let now = self.ctx.now();
            if now < due_at {
                return Ok(None);
            }

            let value_before = basket_math::market_value(&state.units(), prices);
            let units_after =
                match basket_math::rebalance_units(&state.units(), prices, &state.weights()) {
                    Ok(units) => units,
                    Err(e) => {
                        self.append_failure(account_id, now, &e.to_string());
                        return Err(e.into());
                    }
                };

            let record = RebalanceRecord {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                recorded_at: now,
                total_value_before: Some(value_before),
                btc_price: Some(prices.btc),
                eth_price: Some(prices.eth),
                btc_units_before: Some(state.btc_units),
                btc_units_after: Some(units_after.btc),
                eth_units_before: Some(state.eth_units),
                eth_units_after: Some(units_after.eth),
                status: RebalanceStatus::Success,
                error: None,
            };

            let config = &self.ctx.config;
            let mut new_state = state.with_units(units_after, now);
            new_state.next_rebalance_at = Some(schedule::next_occurrence_after(
                now,
                config.rebalance_weekday,
                config.rebalance_hour,
            ));

            match self.store.apply_rebalance(state.version, &new_state, &record) {
                Ok(true) => {
                    info!(
                        "Rebalanced account {} at value {} USD: BTC {} -> {}, ETH {} -> {}",
                        account_id,
                        value_before,
                        state.btc_units,
                        units_after.btc,
                        state.eth_units,
                        units_after.eth
                    );
                    return Ok(Some(record));
                }
                Ok(false) => {
                    debug!(
                        "Version conflict rebalancing account {} (attempt {})",
                        account_id,
                        attempt + 1
                    );
                }
                Err(e) => {
                    self.append_failure(account_id, now, &e.to_string());
                    return Err(e);
                }
            }
        }

        let now = self.ctx.now();
        self.append_failure(account_id, now, "optimistic lock conflict");
        Err(BenchmarkError::PersistenceConflict(account_id.to_string()).into())
    }

    /// Best-effort FAILED audit record; the state and schedule stay as they
    /// were so the next tick retries the same slot.
    fn append_failure(&self, account_id: &str, now: DateTime<Utc>, reason: &str) {
        let record = RebalanceRecord {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            recorded_at: now,
            total_value_before: None,
            btc_price: None,
            eth_price: None,
            btc_units_before: None,
            btc_units_after: None,
            eth_units_before: None,
            eth_units_after: None,
            status: RebalanceStatus::Failed,
            error: Some(reason.to_string()),
        };
        if let Err(e) = self.store.append_failed_rebalance(&record) {
            error!(
                "Failed to write FAILED rebalance record for account {}: {}",
                account_id, e
            );
        }
    }
}
