use chrono::{DateTime, TimeZone, Utc, Weekday};
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::benchmark::basket_math::{market_value, weight_tolerance, within_tolerance};
use crate::benchmark::store_mock::InMemoryStore;
use crate::benchmark::{BenchmarkError, BenchmarkState, BenchmarkStoreTrait};
use crate::context::{Clock, EngineConfig, ServiceContext};
use crate::errors::{Error, Result as AppResult};
use crate::ledger::{
    LedgerRepositoryTrait, ModificationRecord, RebalanceRecord, RebalanceStatus,
};
use crate::market_data::PricePair;
use crate::rebalancing::RebalancingService;

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// 2025-03-10 is a Monday
fn monday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

fn ctx_at(now: DateTime<Utc>) -> ServiceContext {
    let config = EngineConfig {
        rebalance_weekday: Weekday::Mon,
        rebalance_hour: 0,
        ..Default::default()
    };
    ServiceContext::with_clock(config, Arc::new(FixedClock(now)))
}

fn prices() -> PricePair {
    PricePair {
        btc: dec!(65000),
        eth: dec!(3500),
    }
}

fn service(store: Arc<InMemoryStore>, now: DateTime<Utc>) -> RebalancingService {
    RebalancingService::new(store.clone(), store, ctx_at(now))
}

#[test]
fn initialize_splits_nav_at_current_prices() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), monday_noon());

    let state = svc.initialize("acct-1", dec!(10000), &prices()).unwrap();

    assert!(within_tolerance(state.btc_units, dec!(0.0769230769), weight_tolerance()));
    assert!(within_tolerance(state.eth_units, dec!(1.42857143), weight_tolerance()));
    assert_eq!(state.initialized_at, Some(monday_noon()));
    // Monday noon is past the Monday 00:00 slot, so next week
    assert_eq!(
        state.next_rebalance_at,
        Some(Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap())
    );
    assert_eq!(state.initial_nav_usd, Some(dec!(10000)));

    // The checkpoint starts at initialization so older history cannot
    // double-count against the NAV
    let checkpoint = store.get_checkpoint("acct-1").unwrap().unwrap();
    assert_eq!(checkpoint.last_processed_at, Some(monday_noon()));
}

#[test]
fn initialize_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store, monday_noon());

    let first = svc.initialize("acct-1", dec!(10000), &prices()).unwrap();
    let second = svc.initialize("acct-1", dec!(99999), &prices()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn tick_before_the_slot_does_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store.clone(), monday_noon());
    svc.initialize("acct-1", dec!(10000), &prices()).unwrap();

    let result = svc.tick("acct-1", &prices()).unwrap();

    assert!(result.is_none());
    assert!(store.rebalances.read().unwrap().is_empty());
}

#[test]
fn tick_for_uninitialized_account_does_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(store, monday_noon());

    assert!(svc.tick("missing", &prices()).unwrap().is_none());
}

#[test]
fn due_tick_restores_target_weights_and_advances_the_slot() {
    let store = Arc::new(InMemoryStore::new());
    let init_now = monday_noon();
    service(store.clone(), init_now)
        .initialize("acct-1", dec!(10000), &prices())
        .unwrap();

    // Drift the basket, then move past the scheduled slot
    {
        let mut states = store.states.write().unwrap();
        let state = states.get_mut("acct-1").unwrap();
        state.btc_units = dec!(0.2);
        state.eth_units = dec!(0.3);
    }
    let later = Utc.with_ymd_and_hms(2025, 3, 17, 1, 0, 0).unwrap();
    let svc = service(store.clone(), later);

    let drifted_prices = PricePair {
        btc: dec!(70000),
        eth: dec!(3000),
    };
    let record = svc.tick("acct-1", &drifted_prices).unwrap().unwrap();

    assert_eq!(record.status, RebalanceStatus::Success);

    let state = store.get("acct-1").unwrap().unwrap();
    let value = market_value(&state.units(), &drifted_prices);
    let btc_weight = state.btc_units * drifted_prices.btc / value;
    assert!(within_tolerance(btc_weight, dec!(0.5), weight_tolerance()));

    // Value is preserved and the slot advanced strictly past the trigger
    assert!(within_tolerance(
        value,
        record.total_value_before.unwrap(),
        weight_tolerance()
    ));
    assert_eq!(
        state.next_rebalance_at,
        Some(Utc.with_ymd_and_hms(2025, 3, 24, 0, 0, 0).unwrap())
    );
    assert_eq!(state.version, 1);
}

#[test]
fn same_slot_never_fires_twice() {
    let store = Arc::new(InMemoryStore::new());
    service(store.clone(), monday_noon())
        .initialize("acct-1", dec!(10000), &prices())
        .unwrap();

    let later = Utc.with_ymd_and_hms(2025, 3, 17, 1, 0, 0).unwrap();
    let svc = service(store.clone(), later);

    assert!(svc.tick("acct-1", &prices()).unwrap().is_some());
    // Same wall-clock instant, same slot: already consumed
    assert!(svc.tick("acct-1", &prices()).unwrap().is_none());
    assert_eq!(store.rebalances.read().unwrap().len(), 1);
}

/// Store whose state writes always conflict, as if another writer kept
/// winning the compare-and-set.
struct AlwaysConflict {
    inner: Arc<InMemoryStore>,
}

impl BenchmarkStoreTrait for AlwaysConflict {
    fn get(&self, account_id: &str) -> AppResult<Option<BenchmarkState>> {
        self.inner.get(account_id)
    }

    fn insert_initial(&self, state: &BenchmarkState) -> AppResult<()> {
        self.inner.insert_initial(state)
    }

    fn apply_modification(
        &self,
        _expected_version: i64,
        _new_state: &BenchmarkState,
        _record: &ModificationRecord,
    ) -> AppResult<bool> {
        Ok(false)
    }

    fn apply_rebalance(
        &self,
        _expected_version: i64,
        _new_state: &BenchmarkState,
        _record: &RebalanceRecord,
    ) -> AppResult<bool> {
        Ok(false)
    }

    fn append_failed_rebalance(&self, record: &RebalanceRecord) -> AppResult<()> {
        self.inner.append_failed_rebalance(record)
    }
}

#[test]
fn failed_rebalance_leaves_state_and_schedule_untouched() {
    let inner = Arc::new(InMemoryStore::new());
    service(inner.clone(), monday_noon())
        .initialize("acct-1", dec!(10000), &prices())
        .unwrap();
    let before = inner.get("acct-1").unwrap().unwrap();

    let later = Utc.with_ymd_and_hms(2025, 3, 17, 1, 0, 0).unwrap();
    let store = Arc::new(AlwaysConflict {
        inner: inner.clone(),
    });
    let svc = RebalancingService::new(store, inner.clone(), ctx_at(later));

    let result = svc.tick("acct-1", &prices());
    assert!(matches!(
        result,
        Err(Error::Benchmark(BenchmarkError::PersistenceConflict(_)))
    ));

    // State untouched, slot not advanced, FAILED record written for audit
    let after = inner.get("acct-1").unwrap().unwrap();
    assert_eq!(before, after);
    let rebalances = inner.rebalances.read().unwrap();
    assert_eq!(rebalances.len(), 1);
    assert_eq!(rebalances[0].status, RebalanceStatus::Failed);
    assert!(rebalances[0].error.is_some());
}
