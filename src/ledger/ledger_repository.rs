use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;

use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::schema::{benchmark_modifications, benchmark_rebalances, cashflow_events,
    processing_checkpoints};

use super::ledger_errors::LedgerError;
use super::ledger_model::*;

/// Repository for the append-only event ledger, record history and
/// per-account ingestion checkpoints.
pub struct LedgerRepository {
    pool: Arc<DbPool>,
}

impl LedgerRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl super::ledger_traits::LedgerRepositoryTrait for LedgerRepository {
    fn insert_event_if_absent(&self, event: &CashflowEvent) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;

        let db = CashflowEventDB::from(event);
        let inserted = diesel::insert_or_ignore_into(cashflow_events::table)
            .values(&db)
            .execute(&mut conn)
            .map_err(LedgerError::from)?;

        Ok(inserted > 0)
    }

    fn get_events(&self, account_id: &str) -> Result<Vec<CashflowEvent>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = cashflow_events::table
            .filter(cashflow_events::account_id.eq(account_id))
            .select(CashflowEventDB::as_select())
            .order(cashflow_events::event_time.asc())
            .load::<CashflowEventDB>(&mut conn)?;

        Ok(rows.into_iter().map(CashflowEvent::from).collect())
    }

    fn get_unapplied_events(&self, account_id: &str) -> Result<Vec<CashflowEvent>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = cashflow_events::table
            .filter(cashflow_events::account_id.eq(account_id))
            .filter(cashflow_events::applied.eq(false))
            .filter(cashflow_events::usd_value.is_not_null())
            .select(CashflowEventDB::as_select())
            .order(cashflow_events::event_time.asc())
            .load::<CashflowEventDB>(&mut conn)?;

        Ok(rows.into_iter().map(CashflowEvent::from).collect())
    }

    fn get_history(&self, account_id: &str) -> Result<Vec<LedgerEntry>> {
        let mut conn = get_connection(&self.pool)?;

        let modifications = benchmark_modifications::table
            .filter(benchmark_modifications::account_id.eq(account_id))
            .select(ModificationRecordDB::as_select())
            .load::<ModificationRecordDB>(&mut conn)?;

        let rebalances = benchmark_rebalances::table
            .filter(benchmark_rebalances::account_id.eq(account_id))
            .select(RebalanceRecordDB::as_select())
            .load::<RebalanceRecordDB>(&mut conn)?;

        let mut entries: Vec<LedgerEntry> = modifications
            .into_iter()
            .map(|m| LedgerEntry::Modification(ModificationRecord::from(m)))
            .chain(
                rebalances
                    .into_iter()
                    .map(|r| LedgerEntry::Rebalance(RebalanceRecord::from(r))),
            )
            .collect();
        entries.sort_by_key(|e| e.recorded_at());

        Ok(entries)
    }

    fn get_checkpoint(&self, account_id: &str) -> Result<Option<ProcessingCheckpoint>> {
        let mut conn = get_connection(&self.pool)?;

        let row = processing_checkpoints::table
            .find(account_id)
            .select(ProcessingCheckpointDB::as_select())
            .first::<ProcessingCheckpointDB>(&mut conn)
            .optional()?;

        Ok(row.map(ProcessingCheckpoint::from))
    }

    fn record_attempt(&self, account_id: &str, error: Option<&str>) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;

        let now = Utc::now().naive_utc();
        let row = ProcessingCheckpointDB {
            account_id: account_id.to_string(),
            last_processed_at: None,
            last_attempted_at: Some(now),
            last_error: error.map(|e| e.chars().take(4096).collect()),
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(processing_checkpoints::table)
            .values(&row)
            .on_conflict(processing_checkpoints::account_id)
            .do_update()
            .set((
                processing_checkpoints::last_attempted_at.eq(&row.last_attempted_at),
                processing_checkpoints::last_error.eq(&row.last_error),
                processing_checkpoints::updated_at.eq(&row.updated_at),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    fn advance_checkpoint(&self, account_id: &str, processed_through: DateTime<Utc>) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;

        let now = Utc::now().naive_utc();
        let row = ProcessingCheckpointDB {
            account_id: account_id.to_string(),
            last_processed_at: Some(processed_through.naive_utc()),
            last_attempted_at: Some(now),
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(processing_checkpoints::table)
            .values(&row)
            .on_conflict(processing_checkpoints::account_id)
            .do_update()
            .set((
                processing_checkpoints::last_processed_at.eq(&row.last_processed_at),
                processing_checkpoints::last_error.eq::<Option<String>>(None),
                processing_checkpoints::updated_at.eq(&row.updated_at),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
