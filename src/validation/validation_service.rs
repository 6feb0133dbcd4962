use std::sync::Arc;

use log::{info, warn};
use rust_decimal::Decimal;

use crate::benchmark::basket_math::{self, unit_tolerance, within_tolerance, BasketUnits,
    CashflowOutcome};
use crate::benchmark::{BenchmarkError, BenchmarkStoreTrait};
use crate::errors::{Error, Result};
use crate::ledger::{LedgerEntry, LedgerRepositoryTrait, ModificationRecord, RebalanceRecord,
    RebalanceStatus};
use crate::market_data::PricePair;

use super::validation_model::{Discrepancy, ValidationReport};

/// Replays an account's full history from the recorded initial allocation
/// and checks every step against the live state, using the same
/// `basket_math` the live path uses. Every record's `*_after` values are
/// independently recomputed from its `*_before` values, so drift between
/// the recorded numbers and the arithmetic is caught per record, not just
/// at the end.
pub struct ValidationService {
    store: Arc<dyn BenchmarkStoreTrait>,
    ledger: Arc<dyn LedgerRepositoryTrait>,
}

impl ValidationService {
    pub fn new(store: Arc<dyn BenchmarkStoreTrait>, ledger: Arc<dyn LedgerRepositoryTrait>) -> Self {
        Self { store, ledger }
    }

    pub fn validate(&self, account_id: &str) -> Result<ValidationReport> {
        let state = self
            .store
            .get(account_id)?
            .ok_or_else(|| BenchmarkError::NotInitialized(account_id.to_string()))?;

        let (Some(nav), Some(btc_price), Some(eth_price)) = (
            state.initial_nav_usd,
            state.initial_btc_price,
            state.initial_eth_price,
        ) else {
            return Err(Error::Validation(format!(
                "Account {} has no recorded initial allocation inputs",
                account_id
            )));
        };

        let weights = state.weights();
        let initial_prices = PricePair {
            btc: btc_price,
            eth: eth_price,
        };
        let mut replayed = basket_math::initial_allocation(nav, &initial_prices, &weights)?;

        let mut discrepancies = Vec::new();
        let history = self.ledger.get_history(account_id)?;
        let mut replayed_records = 0usize;

        for entry in &history {
            match entry {
                LedgerEntry::Modification(record) => {
                    self.replay_modification(record, &mut replayed, &weights, &mut discrepancies);
                    replayed_records += 1;
                }
                LedgerEntry::Rebalance(record) if record.status == RebalanceStatus::Success => {
                    self.replay_rebalance(record, &mut replayed, &weights, &mut discrepancies);
                    replayed_records += 1;
                }
                LedgerEntry::Rebalance(_) => {} // failed attempts changed nothing
            }
        }

        check(
            None,
            "btc_units",
            replayed.btc,
            state.btc_units,
            &mut discrepancies,
        );
        check(
            None,
            "eth_units",
            replayed.eth,
            state.eth_units,
            &mut discrepancies,
        );

        let report = ValidationReport {
            account_id: account_id.to_string(),
            is_consistent: discrepancies.is_empty(),
            discrepancies,
            replayed_records,
        };

        if report.is_consistent {
            info!(
                "Account {} consistent: {} records replayed",
                account_id, report.replayed_records
            );
        } else {
            warn!(
                "Account {} has {} discrepancies across {} replayed records",
                account_id,
                report.discrepancies.len(),
                report.replayed_records
            );
        }
        Ok(report)
    }

    fn replay_modification(
        &self,
        record: &ModificationRecord,
        replayed: &mut BasketUnits,
        weights: &basket_math::Weights,
        discrepancies: &mut Vec<Discrepancy>,
    ) {
        let id = Some(record.id.clone());

        // The recorded starting point must match the replay so far
        check(
            id.clone(),
            "btc_units_before",
            replayed.btc,
            record.btc_units_before,
            discrepancies,
        );
        check(
            id.clone(),
            "eth_units_before",
            replayed.eth,
            record.eth_units_before,
            discrepancies,
        );

        // The recorded result must match an independent recomputation from
        // the recorded starting point
        let prices = PricePair {
            btc: record.btc_price,
            eth: record.eth_price,
        };
        let recorded_before = BasketUnits {
            btc: record.btc_units_before,
            eth: record.eth_units_before,
        };
        match basket_math::apply_cashflow(&recorded_before, record.cashflow_usd, &prices, weights) {
            Ok(CashflowOutcome::Applied(recomputed)) => {
                check(
                    id.clone(),
                    "btc_units_after",
                    recomputed.btc,
                    record.btc_units_after,
                    discrepancies,
                );
                check(
                    id,
                    "eth_units_after",
                    recomputed.eth,
                    record.eth_units_after,
                    discrepancies,
                );
            }
            Ok(_) | Err(_) => {
                // A recorded modification that the formula cannot reproduce
                // at all is itself a discrepancy
                discrepancies.push(Discrepancy {
                    record_id: id,
                    field: "cashflow_usd".to_string(),
                    expected: record.cashflow_usd,
                    actual: Decimal::ZERO,
                });
            }
        }

        // Continue the replay from the recomputed trajectory
        if let Ok(CashflowOutcome::Applied(next)) =
            basket_math::apply_cashflow(replayed, record.cashflow_usd, &prices, weights)
        {
            *replayed = next;
        }
    }

    fn replay_rebalance(
        &self,
        record: &RebalanceRecord,
        replayed: &mut BasketUnits,
        weights: &basket_math::Weights,
        discrepancies: &mut Vec<Discrepancy>,
    ) {
        let id = Some(record.id.clone());

        let (Some(btc_price), Some(eth_price), Some(btc_before), Some(eth_before), Some(btc_after), Some(eth_after)) = (
            record.btc_price,
            record.eth_price,
            record.btc_units_before,
            record.eth_units_before,
            record.btc_units_after,
            record.eth_units_after,
        ) else {
            discrepancies.push(Discrepancy {
                record_id: id,
                field: "status".to_string(),
                expected: Decimal::ONE,
                actual: Decimal::ZERO,
            });
            return;
        };

        check(
            id.clone(),
            "btc_units_before",
            replayed.btc,
            btc_before,
            discrepancies,
        );
        check(
            id.clone(),
            "eth_units_before",
            replayed.eth,
            eth_before,
            discrepancies,
        );

        let prices = PricePair {
            btc: btc_price,
            eth: eth_price,
        };
        let recorded_before = BasketUnits {
            btc: btc_before,
            eth: eth_before,
        };
        if let Ok(recomputed) = basket_math::rebalance_units(&recorded_before, &prices, weights) {
            check(
                id.clone(),
                "btc_units_after",
                recomputed.btc,
                btc_after,
                discrepancies,
            );
            check(id, "eth_units_after", recomputed.eth, eth_after, discrepancies);
        }

        if let Ok(next) = basket_math::rebalance_units(replayed, &prices, weights) {
            *replayed = next;
        }
    }
}

fn check(
    record_id: Option<String>,
    field: &str,
    expected: Decimal,
    actual: Decimal,
    discrepancies: &mut Vec<Discrepancy>,
) {
    if !within_tolerance(expected, actual, unit_tolerance()) {
        discrepancies.push(Discrepancy {
            record_id,
            field: field.to_string(),
            expected,
            actual,
        });
    }
}
