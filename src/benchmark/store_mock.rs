//! Shared in-memory store used by the service unit tests. Implements the
//! same atomicity semantics as the SQLite repositories: record, state and
//! event flags change together or not at all.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::Result;
use crate::ledger::{
    CashflowEvent, LedgerEntry, LedgerRepositoryTrait, ModificationRecord, ProcessingCheckpoint,
    RebalanceRecord,
};

use super::benchmark_model::BenchmarkState;
use super::benchmark_traits::BenchmarkStoreTrait;

#[derive(Default)]
pub struct InMemoryStore {
    pub states: RwLock<HashMap<String, BenchmarkState>>,
    pub modifications: RwLock<Vec<ModificationRecord>>,
    pub rebalances: RwLock<Vec<RebalanceRecord>>,
    pub events: RwLock<HashMap<(String, String), CashflowEvent>>,
    pub checkpoints: RwLock<HashMap<String, ProcessingCheckpoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_event(&self, event: CashflowEvent) {
        self.events.write().unwrap().insert(
            (event.account_id.clone(), event.external_id.clone()),
            event,
        );
    }
}

impl BenchmarkStoreTrait for InMemoryStore {
    fn get(&self, account_id: &str) -> Result<Option<BenchmarkState>> {
        Ok(self.states.read().unwrap().get(account_id).cloned())
    }

    fn insert_initial(&self, state: &BenchmarkState) -> Result<()> {
        let mut states = self.states.write().unwrap();
        if states.contains_key(&state.account_id) {
            return Err(
                super::benchmark_errors::BenchmarkError::AlreadyInitialized(
                    state.account_id.clone(),
                )
                .into(),
            );
        }
        states.insert(state.account_id.clone(), state.clone());
        Ok(())
    }

    fn apply_modification(
        &self,
        expected_version: i64,
        new_state: &BenchmarkState,
        record: &ModificationRecord,
    ) -> Result<bool> {
        let mut states = self.states.write().unwrap();
        let Some(current) = states.get(&new_state.account_id) else {
            return Ok(false);
        };
        if current.version != expected_version {
            return Ok(false);
        }

        let mut stored = new_state.clone();
        stored.version = expected_version + 1;
        states.insert(stored.account_id.clone(), stored);

        self.modifications.write().unwrap().push(record.clone());

        let mut events = self.events.write().unwrap();
        for id in &record.source_event_ids {
            if let Some(event) = events.get_mut(&(record.account_id.clone(), id.clone())) {
                event.applied = true;
            }
        }

        Ok(true)
    }

    fn apply_rebalance(
        &self,
        expected_version: i64,
        new_state: &BenchmarkState,
        record: &RebalanceRecord,
    ) -> Result<bool> {
        let mut states = self.states.write().unwrap();
        let Some(current) = states.get(&new_state.account_id) else {
            return Ok(false);
        };
        if current.version != expected_version {
            return Ok(false);
        }

        let mut stored = new_state.clone();
        stored.version = expected_version + 1;
        states.insert(stored.account_id.clone(), stored);

        self.rebalances.write().unwrap().push(record.clone());
        Ok(true)
    }

    fn append_failed_rebalance(&self, record: &RebalanceRecord) -> Result<()> {
        self.rebalances.write().unwrap().push(record.clone());
        Ok(())
    }
}

impl LedgerRepositoryTrait for InMemoryStore {
    fn insert_event_if_absent(&self, event: &CashflowEvent) -> Result<bool> {
        let key = (event.account_id.clone(), event.external_id.clone());
        let mut events = self.events.write().unwrap();
        if events.contains_key(&key) {
            return Ok(false);
        }
        events.insert(key, event.clone());
        Ok(true)
    }

    fn get_events(&self, account_id: &str) -> Result<Vec<CashflowEvent>> {
        let mut result: Vec<CashflowEvent> = self
            .events
            .read()
            .unwrap()
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.event_time);
        Ok(result)
    }

    fn get_unapplied_events(&self, account_id: &str) -> Result<Vec<CashflowEvent>> {
        let mut result: Vec<CashflowEvent> = self
            .events
            .read()
            .unwrap()
            .values()
            .filter(|e| e.account_id == account_id && !e.applied && e.usd_value.is_some())
            .cloned()
            .collect();
        result.sort_by_key(|e| e.event_time);
        Ok(result)
    }

    fn get_history(&self, account_id: &str) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .modifications
            .read()
            .unwrap()
            .iter()
            .filter(|m| m.account_id == account_id)
            .cloned()
            .map(LedgerEntry::Modification)
            .chain(
                self.rebalances
                    .read()
                    .unwrap()
                    .iter()
                    .filter(|r| r.account_id == account_id)
                    .cloned()
                    .map(LedgerEntry::Rebalance),
            )
            .collect();
        entries.sort_by_key(|e| e.recorded_at());
        Ok(entries)
    }

    fn get_checkpoint(&self, account_id: &str) -> Result<Option<ProcessingCheckpoint>> {
        Ok(self.checkpoints.read().unwrap().get(account_id).cloned())
    }

    fn record_attempt(&self, account_id: &str, error: Option<&str>) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().unwrap();
        let entry = checkpoints
            .entry(account_id.to_string())
            .or_insert_with(|| ProcessingCheckpoint {
                account_id: account_id.to_string(),
                last_processed_at: None,
                last_attempted_at: None,
                last_error: None,
            });
        entry.last_attempted_at = Some(Utc::now());
        entry.last_error = error.map(|e| e.to_string());
        Ok(())
    }

    fn advance_checkpoint(&self, account_id: &str, processed_through: DateTime<Utc>) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().unwrap();
        let entry = checkpoints
            .entry(account_id.to_string())
            .or_insert_with(|| ProcessingCheckpoint {
                account_id: account_id.to_string(),
                last_processed_at: None,
                last_attempted_at: None,
                last_error: None,
            });
        entry.last_processed_at = Some(processed_through);
        entry.last_error = None;
        Ok(())
    }
}
