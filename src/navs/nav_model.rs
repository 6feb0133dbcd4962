use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One point of the (NAV, benchmark value) time series consumed by
/// dashboards and fee calculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NavSnapshot {
    pub id: String,
    pub account_id: String,
    pub recorded_at: DateTime<Utc>,
    pub nav_usd: Decimal,
    pub benchmark_value_usd: Decimal,
    pub btc_price: Decimal,
    pub eth_price: Decimal,
}

/// Database model for NAV history rows
#[derive(Queryable, Selectable, Identifiable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::nav_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NavSnapshotDB {
    pub id: String,
    pub account_id: String,
    pub recorded_at: NaiveDateTime,
    pub nav_usd: String,
    pub benchmark_value_usd: String,
    pub btc_price: String,
    pub eth_price: String,
}

fn parse_decimal(field: &str, raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        log::error!("Failed to parse stored decimal {} '{}': {}", field, raw, e);
        Decimal::ZERO
    })
}

impl From<NavSnapshotDB> for NavSnapshot {
    fn from(db: NavSnapshotDB) -> Self {
        Self {
            recorded_at: DateTime::from_naive_utc_and_offset(db.recorded_at, Utc),
            nav_usd: parse_decimal("nav_usd", &db.nav_usd),
            benchmark_value_usd: parse_decimal("benchmark_value_usd", &db.benchmark_value_usd),
            btc_price: parse_decimal("btc_price", &db.btc_price),
            eth_price: parse_decimal("eth_price", &db.eth_price),
            id: db.id,
            account_id: db.account_id,
        }
    }
}

impl From<&NavSnapshot> for NavSnapshotDB {
    fn from(domain: &NavSnapshot) -> Self {
        Self {
            id: domain.id.clone(),
            account_id: domain.account_id.clone(),
            recorded_at: domain.recorded_at.naive_utc(),
            nav_usd: domain.nav_usd.to_string(),
            benchmark_value_usd: domain.benchmark_value_usd.to_string(),
            btc_price: domain.btc_price.to_string(),
            eth_price: domain.eth_price.to_string(),
        }
    }
}
