use std::sync::Arc;

use log::{debug, info, warn};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::benchmark::basket_math::{self, CashflowOutcome};
use crate::benchmark::{BenchmarkError, BenchmarkStoreTrait};
use crate::context::ServiceContext;
use crate::errors::Result;
use crate::ledger::ModificationRecord;
use crate::market_data::PricePair;

/// Applies the net external cashflow of an ingestion batch to the account's
/// synthetic basket: deposits buy at the target weights, withdrawals redeem
/// pro rata. Every applied batch leaves exactly one modification record.
pub struct AdjustmentService {
    store: Arc<dyn BenchmarkStoreTrait>,
    ctx: ServiceContext,
}

impl AdjustmentService {
    pub fn new(store: Arc<dyn BenchmarkStoreTrait>, ctx: ServiceContext) -> Self {
        Self { store, ctx }
    }

    /// Applies `net_usd` at the given prices. Returns the written record, or
    /// None when there was nothing to apply. The record append, the state
    /// update and the consumed-event flags commit atomically; a version
    /// conflict is retried once against the re-read state.
    pub fn apply_net_cashflow(
        &self,
        account_id: &str,
        net_usd: Decimal,
        prices: &PricePair,
        source_event_ids: &[String],
    ) -> Result<Option<ModificationRecord>> {
        if net_usd.is_zero() {
            return Ok(None);
        }

        for attempt in 0..2 {
            let state = self
                .store
                .get(account_id)?
                .ok_or_else(|| BenchmarkError::NotInitialized(account_id.to_string()))?;

            let outcome =
                basket_math::apply_cashflow(&state.units(), net_usd, prices, &state.weights())?;

            let units_after = match outcome {
                CashflowOutcome::NoOp => return Ok(None),
                CashflowOutcome::EmptyBasket => {
                    warn!(
                        "Withdrawal of {} USD against an empty basket for account {}; nothing to redeem",
                        net_usd.abs(),
                        account_id
                    );
                    return Ok(None);
                }
                CashflowOutcome::Applied(units) => units,
            };

            if net_usd < Decimal::ZERO {
                let value = basket_math::market_value(&state.units(), prices);
                if net_usd.abs() > value {
                    warn!(
                        "Withdrawal of {} USD exceeds basket value {} USD for account {}; redemption clamped to the full basket",
                        net_usd.abs(),
                        value,
                        account_id
                    );
                }
            }

            let now = self.ctx.now();
            let record = ModificationRecord {
                id: Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                recorded_at: now,
                cashflow_usd: net_usd,
                btc_units_before: state.btc_units,
                btc_units_after: units_after.btc,
                eth_units_before: state.eth_units,
                eth_units_after: units_after.eth,
                btc_price: prices.btc,
                eth_price: prices.eth,
                source_event_ids: source_event_ids.to_vec(),
            };
            let new_state = state.with_units(units_after, now);

            if self
                .store
                .apply_modification(state.version, &new_state, &record)?
            {
                info!(
                    "Applied {} USD cashflow to account {}: BTC {} -> {}, ETH {} -> {}",
                    net_usd,
                    account_id,
                    record.btc_units_before,
                    record.btc_units_after,
                    record.eth_units_before,
                    record.eth_units_after
                );
                return Ok(Some(record));
            }

            debug!(
                "Version conflict applying cashflow to account {} (attempt {})",
                account_id,
                attempt + 1
            );
        }

        Err(BenchmarkError::PersistenceConflict(account_id.to_string()).into())
    }
}
