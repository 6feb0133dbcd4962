use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::basket_math::{BasketUnits, Weights};

/// Per-account synthetic basket state. Mutated only by the cashflow
/// adjuster and the rebalancer, through the versioned store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkState {
    pub account_id: String,
    pub btc_units: Decimal,
    pub eth_units: Decimal,
    pub btc_weight: Decimal,
    pub eth_weight: Decimal,
    /// Inputs of the initial allocation, written once by Initialize and
    /// replayed by the consistency validator.
    pub initial_nav_usd: Option<Decimal>,
    pub initial_btc_price: Option<Decimal>,
    pub initial_eth_price: Option<Decimal>,
    pub initialized_at: Option<DateTime<Utc>>,
    pub next_rebalance_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version, bumped on every state write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BenchmarkState {
    pub fn units(&self) -> BasketUnits {
        BasketUnits {
            btc: self.btc_units,
            eth: self.eth_units,
        }
    }

    pub fn weights(&self) -> Weights {
        Weights {
            btc: self.btc_weight,
            eth: self.eth_weight,
        }
    }

    /// Next state after a units change; the store bumps the version on
    /// write.
    pub fn with_units(&self, units: BasketUnits, updated_at: DateTime<Utc>) -> Self {
        Self {
            btc_units: units.btc,
            eth_units: units.eth,
            updated_at,
            ..self.clone()
        }
    }
}

/// Database model for benchmark states
#[derive(Queryable, Selectable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::benchmark_states)]
#[diesel(primary_key(account_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BenchmarkStateDB {
    pub account_id: String,
    pub btc_units: String,
    pub eth_units: String,
    pub btc_weight: String,
    pub eth_weight: String,
    pub initial_nav_usd: Option<String>,
    pub initial_btc_price: Option<String>,
    pub initial_eth_price: Option<String>,
    pub initialized_at: Option<NaiveDateTime>,
    pub next_rebalance_at: Option<NaiveDateTime>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

fn parse_decimal(field: &str, raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        log::error!("Failed to parse stored decimal {} '{}': {}", field, raw, e);
        Decimal::ZERO
    })
}

impl From<BenchmarkStateDB> for BenchmarkState {
    fn from(db: BenchmarkStateDB) -> Self {
        Self {
            btc_units: parse_decimal("btc_units", &db.btc_units),
            eth_units: parse_decimal("eth_units", &db.eth_units),
            btc_weight: parse_decimal("btc_weight", &db.btc_weight),
            eth_weight: parse_decimal("eth_weight", &db.eth_weight),
            initial_nav_usd: db
                .initial_nav_usd
                .as_deref()
                .map(|s| parse_decimal("initial_nav_usd", s)),
            initial_btc_price: db
                .initial_btc_price
                .as_deref()
                .map(|s| parse_decimal("initial_btc_price", s)),
            initial_eth_price: db
                .initial_eth_price
                .as_deref()
                .map(|s| parse_decimal("initial_eth_price", s)),
            initialized_at: db
                .initialized_at
                .map(|t| DateTime::from_naive_utc_and_offset(t, Utc)),
            next_rebalance_at: db
                .next_rebalance_at
                .map(|t| DateTime::from_naive_utc_and_offset(t, Utc)),
            version: db.version,
            created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(db.updated_at, Utc),
            account_id: db.account_id,
        }
    }
}

impl From<&BenchmarkState> for BenchmarkStateDB {
    fn from(domain: &BenchmarkState) -> Self {
        Self {
            account_id: domain.account_id.clone(),
            btc_units: domain.btc_units.to_string(),
            eth_units: domain.eth_units.to_string(),
            btc_weight: domain.btc_weight.to_string(),
            eth_weight: domain.eth_weight.to_string(),
            initial_nav_usd: domain.initial_nav_usd.map(|v| v.to_string()),
            initial_btc_price: domain.initial_btc_price.map(|v| v.to_string()),
            initial_eth_price: domain.initial_eth_price.map(|v| v.to_string()),
            initialized_at: domain.initialized_at.map(|t| t.naive_utc()),
            next_rebalance_at: domain.next_rebalance_at.map(|t| t.naive_utc()),
            version: domain.version,
            created_at: domain.created_at.naive_utc(),
            updated_at: domain.updated_at.naive_utc(),
        }
    }
}
