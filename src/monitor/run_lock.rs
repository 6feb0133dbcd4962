use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use log::warn;

use crate::constants::MONITOR_LOCK_ID;
use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::schema::monitor_locks;

/// Process-wide mutual exclusion for batch runs. A crashed holder is
/// evicted once its lock exceeds the staleness timeout, so a dead run can
/// never block future cycles permanently.
pub trait RunLockRepositoryTrait: Send + Sync {
    fn try_acquire(&self, holder: &str, stale_after: Duration) -> Result<bool>;
    fn release(&self, holder: &str) -> Result<()>;
}

#[derive(Queryable, Selectable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::monitor_locks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct MonitorLockDB {
    id: String,
    holder: String,
    acquired_at: NaiveDateTime,
}

pub struct RunLockRepository {
    pool: Arc<DbPool>,
}

impl RunLockRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl RunLockRepositoryTrait for RunLockRepository {
    fn try_acquire(&self, holder: &str, stale_after: Duration) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;

        let now = Utc::now().naive_utc();
        let acquired = conn.transaction::<bool, diesel::result::Error, _>(|conn| {
            let existing = monitor_locks::table
                .find(MONITOR_LOCK_ID)
                .select(MonitorLockDB::as_select())
                .first::<MonitorLockDB>(conn)
                .optional()?;

            match existing {
                None => {
                    diesel::insert_into(monitor_locks::table)
                        .values(&MonitorLockDB {
                            id: MONITOR_LOCK_ID.to_string(),
                            holder: holder.to_string(),
                            acquired_at: now,
                        })
                        .execute(conn)?;
                    Ok(true)
                }
                Some(lock) => {
                    let age = now.signed_duration_since(lock.acquired_at);
                    if age.to_std().map(|a| a >= stale_after).unwrap_or(true) {
                        warn!(
                            "Evicting stale run lock held by {} for {:?}",
                            lock.holder, age
                        );
                        diesel::update(monitor_locks::table.find(MONITOR_LOCK_ID))
                            .set((
                                monitor_locks::holder.eq(holder),
                                monitor_locks::acquired_at.eq(now),
                            ))
                            .execute(conn)?;
                        Ok(true)
                    } else {
                        Ok(false)
                    }
                }
            }
        })?;

        Ok(acquired)
    }

    fn release(&self, holder: &str) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;

        diesel::delete(
            monitor_locks::table
                .find(MONITOR_LOCK_ID)
                .filter(monitor_locks::holder.eq(holder)),
        )
        .execute(&mut conn)?;

        Ok(())
    }
}
