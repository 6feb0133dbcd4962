use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};

use benchtrack_core::context::Clock;
use benchtrack_core::db::{self, DbPool};
use benchtrack_core::ingestion::{RawRecord, SourceError, SourceKind, TransactionSource};
use benchtrack_core::market_data::{MarketDataError, PriceMap, PriceOracle};
use benchtrack_core::navs::NavSource;

/// Creates a fresh on-disk database for one test run and returns its pool.
pub fn setup_pool(test_id: &str) -> Arc<DbPool> {
    let dir = Local::now()
        .format(&format!("./tests/output/%Y%m%d-%H%M%S%.3f-{}", test_id))
        .to_string();
    std::fs::create_dir_all(&dir).expect("Failed to create test output directory");

    let db_path = format!("{}/engine.db", dir);
    db::init(&db_path).expect("Failed to initialize database");
    let pool = db::create_pool(&db_path).expect("Failed to create database pool");
    db::run_migrations(&pool).expect("Failed to run migrations");
    pool
}

/// Clock whose reading the test advances explicitly.
pub struct SettableClock(RwLock<DateTime<Utc>>);

impl SettableClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(RwLock::new(start))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.write().unwrap() = now;
    }
}

impl Clock for SettableClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.read().unwrap()
    }
}

/// Oracle serving a mutable in-memory price table.
pub struct TableOracle {
    prices: RwLock<PriceMap>,
}

impl TableOracle {
    pub fn new(prices: &[(&str, Decimal)]) -> Self {
        Self {
            prices: RwLock::new(
                prices
                    .iter()
                    .map(|(symbol, price)| (symbol.to_string(), *price))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, symbol: &str, price: Decimal) {
        self.prices
            .write()
            .unwrap()
            .insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl PriceOracle for TableOracle {
    async fn get_prices(&self, symbols: &[String]) -> Result<PriceMap, MarketDataError> {
        let table = self.prices.read().unwrap();
        let found: PriceMap = symbols
            .iter()
            .filter_map(|s| table.get(s).map(|p| (s.clone(), *p)))
            .collect();
        if found.is_empty() {
            return Err(MarketDataError::PriceUnavailable);
        }
        Ok(found)
    }
}

/// NAV source returning a mutable fixed reading.
pub struct FixedNavSource {
    nav: RwLock<Option<Decimal>>,
}

impl FixedNavSource {
    pub fn new(nav: Decimal) -> Self {
        Self {
            nav: RwLock::new(Some(nav)),
        }
    }

    pub fn set(&self, nav: Decimal) {
        *self.nav.write().unwrap() = Some(nav);
    }

    pub fn clear(&self) {
        *self.nav.write().unwrap() = None;
    }
}

#[async_trait]
impl NavSource for FixedNavSource {
    async fn fetch_nav(&self, _account_id: &str) -> Result<Decimal, SourceError> {
        self.nav
            .read()
            .unwrap()
            .ok_or_else(|| SourceError::Unavailable("no NAV reading".to_string()))
    }
}

/// Transaction source whose records the test scripts as it goes.
pub struct ScriptedSource {
    kind: SourceKind,
    records: RwLock<Vec<RawRecord>>,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn push(&self, record: RawRecord) {
        self.records.write().unwrap().push(record);
    }
}

fn record_time(record: &RawRecord) -> DateTime<Utc> {
    match record {
        RawRecord::Transfer(r) => r.completed_at,
        RawRecord::SubTransfer(r) => r.transferred_at,
        RawRecord::Pay(r) => r.paid_at,
        RawRecord::Dividend(r) => r.paid_at,
    }
}

#[async_trait]
impl TransactionSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_since(
        &self,
        _account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        Ok(self
            .records
            .read()
            .unwrap()
            .iter()
            .filter(|r| record_time(r) > since)
            .cloned()
            .collect())
    }
}
