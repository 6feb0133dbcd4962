use chrono::{DateTime, Utc};

use crate::errors::Result;

use super::ledger_model::{CashflowEvent, LedgerEntry, ProcessingCheckpoint};

/// Trait defining the contract for the event ledger and its checkpoints.
pub trait LedgerRepositoryTrait: Send + Sync {
    /// Inserts the event unless a row with the same `(account_id,
    /// external_id)` already exists. Returns true only when a new row was
    /// written; a duplicate is a no-op, not an error.
    fn insert_event_if_absent(&self, event: &CashflowEvent) -> Result<bool>;

    fn get_events(&self, account_id: &str) -> Result<Vec<CashflowEvent>>;

    /// Usd-valued events not yet consumed by a modification, oldest first.
    fn get_unapplied_events(&self, account_id: &str) -> Result<Vec<CashflowEvent>>;

    /// Modification and rebalance records merged in ascending timestamp
    /// order.
    fn get_history(&self, account_id: &str) -> Result<Vec<LedgerEntry>>;

    fn get_checkpoint(&self, account_id: &str) -> Result<Option<ProcessingCheckpoint>>;

    /// Stamps an ingestion attempt (and its error, if any) without moving
    /// the processed boundary.
    fn record_attempt(&self, account_id: &str, error: Option<&str>) -> Result<()>;

    /// Moves the processed boundary forward. Called only after a batch has
    /// been durably recorded and applied.
    fn advance_checkpoint(&self, account_id: &str, processed_through: DateTime<Utc>) -> Result<()>;
}
