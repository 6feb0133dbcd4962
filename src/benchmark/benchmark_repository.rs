use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::sync::Arc;

use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::ledger::ledger_model::{ModificationRecordDB, RebalanceRecordDB};
use crate::ledger::{ModificationRecord, RebalanceRecord};
use crate::schema::{benchmark_modifications, benchmark_rebalances, benchmark_states,
    cashflow_events};

use super::benchmark_errors::BenchmarkError;
use super::benchmark_model::{BenchmarkState, BenchmarkStateDB};
use super::benchmark_traits::BenchmarkStoreTrait;

/// Versioned store for benchmark states. Record appends and state updates
/// commit in a single SQLite transaction so a partial numeric write can
/// never be observed.
pub struct BenchmarkRepository {
    pool: Arc<DbPool>,
}

impl BenchmarkRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl BenchmarkStoreTrait for BenchmarkRepository {
    fn get(&self, account_id: &str) -> Result<Option<BenchmarkState>> {
        let mut conn = get_connection(&self.pool)?;

        let row = benchmark_states::table
            .find(account_id)
            .select(BenchmarkStateDB::as_select())
            .first::<BenchmarkStateDB>(&mut conn)
            .optional()?;

        Ok(row.map(BenchmarkState::from))
    }

    fn insert_initial(&self, state: &BenchmarkState) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;

        let db = BenchmarkStateDB::from(state);
        diesel::insert_into(benchmark_states::table)
            .values(&db)
            .execute(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    BenchmarkError::AlreadyInitialized(state.account_id.clone()).into()
                }
                other => crate::errors::Error::from(other),
            })?;

        Ok(())
    }

    fn apply_modification(
        &self,
        expected_version: i64,
        new_state: &BenchmarkState,
        record: &ModificationRecord,
    ) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;

        let record_db = ModificationRecordDB::from(record);
        let state_db = BenchmarkStateDB::from(new_state);

        let result = conn.transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(benchmark_modifications::table)
                .values(&record_db)
                .execute(conn)?;

            let updated = diesel::update(
                benchmark_states::table
                    .filter(benchmark_states::account_id.eq(&new_state.account_id))
                    .filter(benchmark_states::version.eq(expected_version)),
            )
            .set((
                benchmark_states::btc_units.eq(&state_db.btc_units),
                benchmark_states::eth_units.eq(&state_db.eth_units),
                benchmark_states::version.eq(expected_version + 1),
                benchmark_states::updated_at.eq(state_db.updated_at),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(DieselError::RollbackTransaction);
            }

            diesel::update(
                cashflow_events::table
                    .filter(cashflow_events::account_id.eq(&new_state.account_id))
                    .filter(cashflow_events::external_id.eq_any(&record.source_event_ids)),
            )
            .set(cashflow_events::applied.eq(true))
            .execute(conn)?;

            Ok(())
        });

        match result {
            Ok(()) => Ok(true),
            Err(DieselError::RollbackTransaction) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn apply_rebalance(
        &self,
        expected_version: i64,
        new_state: &BenchmarkState,
        record: &RebalanceRecord,
    ) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;

        let record_db = RebalanceRecordDB::from(record);
        let state_db = BenchmarkStateDB::from(new_state);

        let result = conn.transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(benchmark_rebalances::table)
                .values(&record_db)
                .execute(conn)?;

            let updated = diesel::update(
                benchmark_states::table
                    .filter(benchmark_states::account_id.eq(&new_state.account_id))
                    .filter(benchmark_states::version.eq(expected_version)),
            )
            .set((
                benchmark_states::btc_units.eq(&state_db.btc_units),
                benchmark_states::eth_units.eq(&state_db.eth_units),
                benchmark_states::next_rebalance_at.eq(state_db.next_rebalance_at),
                benchmark_states::version.eq(expected_version + 1),
                benchmark_states::updated_at.eq(state_db.updated_at),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(DieselError::RollbackTransaction);
            }

            Ok(())
        });

        match result {
            Ok(()) => Ok(true),
            Err(DieselError::RollbackTransaction) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn append_failed_rebalance(&self, record: &RebalanceRecord) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;

        let record_db = RebalanceRecordDB::from(record);
        diesel::insert_into(benchmark_rebalances::table)
            .values(&record_db)
            .execute(&mut conn)?;

        Ok(())
    }
}
