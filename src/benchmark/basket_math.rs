//! The basket arithmetic used by initialization, cashflow adjustment,
//! rebalancing and the consistency validator. Exactly one implementation of
//! each formula lives here; the live path and the replay path both call it.

use rust_decimal::Decimal;

use crate::market_data::PricePair;

use super::benchmark_errors::BenchmarkError;

/// Unit holdings of the two-asset basket. Always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasketUnits {
    pub btc: Decimal,
    pub eth: Decimal,
}

impl BasketUnits {
    pub const ZERO: BasketUnits = BasketUnits {
        btc: Decimal::ZERO,
        eth: Decimal::ZERO,
    };
}

/// Target allocation weights; must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weights {
    pub btc: Decimal,
    pub eth: Decimal,
}

/// Result of applying a net cashflow to the basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashflowOutcome {
    /// Units after the proportional buy or pro-rata sell.
    Applied(BasketUnits),
    /// Withdrawal against a worthless basket; nothing to redeem.
    EmptyBasket,
    /// Zero net cashflow; nothing to do.
    NoOp,
}

/// Absolute unit difference below which two holdings are considered equal.
pub fn unit_tolerance() -> Decimal {
    Decimal::new(1, 7) // 1e-7
}

/// Tolerance for weight checks after a rebalance.
pub fn weight_tolerance() -> Decimal {
    Decimal::new(1, 6) // 1e-6
}

pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

fn ensure_positive_prices(prices: &PricePair) -> Result<(), BenchmarkError> {
    if prices.btc <= Decimal::ZERO || prices.eth <= Decimal::ZERO {
        return Err(BenchmarkError::InvalidPrice(format!(
            "prices must be positive, got BTC={} ETH={}",
            prices.btc, prices.eth
        )));
    }
    Ok(())
}

/// USD value of the basket at the given prices.
pub fn market_value(units: &BasketUnits, prices: &PricePair) -> Decimal {
    units.btc * prices.btc + units.eth * prices.eth
}

/// Splits an initial NAV into basket units at the target weights.
pub fn initial_allocation(
    nav_usd: Decimal,
    prices: &PricePair,
    weights: &Weights,
) -> Result<BasketUnits, BenchmarkError> {
    ensure_positive_prices(prices)?;
    if nav_usd < Decimal::ZERO {
        return Err(BenchmarkError::InvalidPrice(format!(
            "initial NAV cannot be negative, got {}",
            nav_usd
        )));
    }

    Ok(BasketUnits {
        btc: nav_usd * weights.btc / prices.btc,
        eth: nav_usd * weights.eth / prices.eth,
    })
}

/// Applies a net external cashflow to the basket.
///
/// A deposit buys both assets at the target weights. A withdrawal redeems
/// pro rata across the current holdings, preserving the existing allocation
/// ratio; the redemption ratio is clamped at 1 so units can never go
/// negative when a withdrawal nominally exceeds the synthetic value.
pub fn apply_cashflow(
    units: &BasketUnits,
    net_usd: Decimal,
    prices: &PricePair,
    weights: &Weights,
) -> Result<CashflowOutcome, BenchmarkError> {
    if net_usd.is_zero() {
        return Ok(CashflowOutcome::NoOp);
    }
    ensure_positive_prices(prices)?;

    if net_usd > Decimal::ZERO {
        return Ok(CashflowOutcome::Applied(BasketUnits {
            btc: units.btc + net_usd * weights.btc / prices.btc,
            eth: units.eth + net_usd * weights.eth / prices.eth,
        }));
    }

    let value = market_value(units, prices);
    if value <= Decimal::ZERO {
        return Ok(CashflowOutcome::EmptyBasket);
    }

    let mut ratio = net_usd.abs() / value;
    if ratio > Decimal::ONE {
        ratio = Decimal::ONE;
    }
    let keep = Decimal::ONE - ratio;

    Ok(CashflowOutcome::Applied(BasketUnits {
        btc: units.btc * keep,
        eth: units.eth * keep,
    }))
}

/// Resets the basket to the target weights at current prices, preserving
/// total value.
pub fn rebalance_units(
    units: &BasketUnits,
    prices: &PricePair,
    weights: &Weights,
) -> Result<BasketUnits, BenchmarkError> {
    ensure_positive_prices(prices)?;
    let value = market_value(units, prices);

    Ok(BasketUnits {
        btc: value * weights.btc / prices.btc,
        eth: value * weights.eth / prices.eth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn prices() -> PricePair {
        PricePair {
            btc: dec!(65000),
            eth: dec!(3500),
        }
    }

    fn half_half() -> Weights {
        Weights {
            btc: dec!(0.5),
            eth: dec!(0.5),
        }
    }

    #[test]
    fn initial_allocation_splits_nav_at_target_weights() {
        let units = initial_allocation(dec!(10000), &prices(), &half_half()).unwrap();

        assert!(within_tolerance(units.btc, dec!(0.0769230769), weight_tolerance()));
        assert!(within_tolerance(units.eth, dec!(1.42857143), weight_tolerance()));
    }

    #[test]
    fn initial_allocation_of_zero_nav_is_empty() {
        let units = initial_allocation(Decimal::ZERO, &prices(), &half_half()).unwrap();
        assert_eq!(units, BasketUnits::ZERO);
    }

    #[test]
    fn initial_allocation_rejects_non_positive_price() {
        let bad = PricePair {
            btc: Decimal::ZERO,
            eth: dec!(3500),
        };
        assert!(initial_allocation(dec!(10000), &bad, &half_half()).is_err());
    }

    #[test]
    fn deposit_buys_both_assets_proportionally() {
        let before = BasketUnits {
            btc: dec!(0.1),
            eth: dec!(1.0),
        };
        let outcome = apply_cashflow(&before, dec!(1000), &prices(), &half_half()).unwrap();

        let CashflowOutcome::Applied(after) = outcome else {
            panic!("expected applied outcome, got {:?}", outcome);
        };
        assert!(within_tolerance(after.btc - before.btc, dec!(0.00769231), weight_tolerance()));
        assert!(within_tolerance(after.eth - before.eth, dec!(0.14285714), weight_tolerance()));
    }

    #[test]
    fn withdrawal_redeems_pro_rata() {
        // Basket worth exactly $10,000: 0.1 * 65,000 + 1.0 * 3,500 = 10,000
        let before = BasketUnits {
            btc: dec!(0.1),
            eth: dec!(1.0),
        };
        let custom = PricePair {
            btc: dec!(65000),
            eth: dec!(3500),
        };
        let outcome = apply_cashflow(&before, dec!(-1000), &custom, &half_half()).unwrap();

        let CashflowOutcome::Applied(after) = outcome else {
            panic!("expected applied outcome, got {:?}", outcome);
        };
        assert!(within_tolerance(after.btc, dec!(0.09), unit_tolerance()));
        assert!(within_tolerance(after.eth, dec!(0.9), unit_tolerance()));
    }

    #[test]
    fn withdrawal_preserves_allocation_ratio() {
        let before = BasketUnits {
            btc: dec!(0.25),
            eth: dec!(3.75),
        };
        let outcome = apply_cashflow(&before, dec!(-4321.99), &prices(), &half_half()).unwrap();

        let CashflowOutcome::Applied(after) = outcome else {
            panic!("expected applied outcome, got {:?}", outcome);
        };
        let ratio_before = before.btc / before.eth;
        let ratio_after = after.btc / after.eth;
        assert!(within_tolerance(ratio_before, ratio_after, unit_tolerance()));
    }

    #[test]
    fn oversized_withdrawal_clamps_to_zero_units() {
        let before = BasketUnits {
            btc: dec!(0.01),
            eth: dec!(0.1),
        };
        let value = market_value(&before, &prices());
        let outcome =
            apply_cashflow(&before, -(value + dec!(500)), &prices(), &half_half()).unwrap();

        let CashflowOutcome::Applied(after) = outcome else {
            panic!("expected applied outcome, got {:?}", outcome);
        };
        assert_eq!(after.btc, Decimal::ZERO);
        assert_eq!(after.eth, Decimal::ZERO);
    }

    #[test]
    fn withdrawal_from_empty_basket_is_flagged() {
        let outcome =
            apply_cashflow(&BasketUnits::ZERO, dec!(-100), &prices(), &half_half()).unwrap();
        assert_eq!(outcome, CashflowOutcome::EmptyBasket);
    }

    #[test]
    fn zero_cashflow_is_a_no_op() {
        let before = BasketUnits {
            btc: dec!(0.1),
            eth: dec!(1.0),
        };
        let outcome = apply_cashflow(&before, Decimal::ZERO, &prices(), &half_half()).unwrap();
        assert_eq!(outcome, CashflowOutcome::NoOp);
    }

    #[test]
    fn rebalance_restores_target_weights() {
        // Heavily drifted basket
        let drifted = BasketUnits {
            btc: dec!(0.5),
            eth: dec!(0.2),
        };
        let after = rebalance_units(&drifted, &prices(), &half_half()).unwrap();

        let value = market_value(&after, &prices());
        let btc_weight = after.btc * prices().btc / value;
        let eth_weight = after.eth * prices().eth / value;
        assert!(within_tolerance(btc_weight, dec!(0.5), weight_tolerance()));
        assert!(within_tolerance(eth_weight, dec!(0.5), weight_tolerance()));
    }

    #[test]
    fn rebalance_preserves_total_value() {
        let drifted = BasketUnits {
            btc: dec!(0.31),
            eth: dec!(4.2),
        };
        let value_before = market_value(&drifted, &prices());
        let after = rebalance_units(&drifted, &prices(), &half_half()).unwrap();
        let value_after = market_value(&after, &prices());

        assert!(within_tolerance(value_before, value_after, unit_tolerance()));
    }

    #[test]
    fn uneven_weights_are_respected() {
        let weights = Weights {
            btc: dec!(0.7),
            eth: dec!(0.3),
        };
        let units = initial_allocation(dec!(10000), &prices(), &weights).unwrap();

        assert!(within_tolerance(units.btc * prices().btc, dec!(7000), weight_tolerance()));
        assert!(within_tolerance(units.eth * prices().eth, dec!(3000), weight_tolerance()));
    }
}
