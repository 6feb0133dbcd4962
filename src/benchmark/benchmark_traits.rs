use crate::errors::Result;
use crate::ledger::{ModificationRecord, RebalanceRecord};

use super::benchmark_model::BenchmarkState;

/// Contract for the versioned benchmark state store.
///
/// The `apply_*` operations are atomic: the append-only record, the
/// compare-and-set state update and (for modifications) the consumed-event
/// flags commit together or not at all. They return false on a version
/// conflict, leaving everything untouched.
pub trait BenchmarkStoreTrait: Send + Sync {
    fn get(&self, account_id: &str) -> Result<Option<BenchmarkState>>;

    /// Creates the state row for a freshly initialized account. Fails if a
    /// row already exists.
    fn insert_initial(&self, state: &BenchmarkState) -> Result<()>;

    /// Appends the modification record, updates the state guarded on
    /// `expected_version` and marks the record's source events applied.
    fn apply_modification(
        &self,
        expected_version: i64,
        new_state: &BenchmarkState,
        record: &ModificationRecord,
    ) -> Result<bool>;

    /// Appends the rebalance record and updates the state guarded on
    /// `expected_version`.
    fn apply_rebalance(
        &self,
        expected_version: i64,
        new_state: &BenchmarkState,
        record: &RebalanceRecord,
    ) -> Result<bool>;

    /// Appends a FAILED rebalance record without touching the state.
    fn append_failed_rebalance(&self, record: &RebalanceRecord) -> Result<()>;
}
