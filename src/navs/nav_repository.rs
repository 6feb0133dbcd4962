use diesel::prelude::*;
use std::sync::Arc;

use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::schema::nav_history;

use super::nav_model::{NavSnapshot, NavSnapshotDB};
use super::nav_traits::NavRepositoryTrait;

/// Repository for the NAV/benchmark time series
pub struct NavRepository {
    pool: Arc<DbPool>,
}

impl NavRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl NavRepositoryTrait for NavRepository {
    fn append(&self, snapshot: &NavSnapshot) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;

        let db = NavSnapshotDB::from(snapshot);
        diesel::insert_into(nav_history::table)
            .values(&db)
            .execute(&mut conn)?;

        Ok(())
    }

    fn get_history(&self, account_id: &str) -> Result<Vec<NavSnapshot>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = nav_history::table
            .filter(nav_history::account_id.eq(account_id))
            .select(NavSnapshotDB::as_select())
            .order(nav_history::recorded_at.asc())
            .load::<NavSnapshotDB>(&mut conn)?;

        Ok(rows.into_iter().map(NavSnapshot::from).collect())
    }

    fn get_latest(&self, account_id: &str) -> Result<Option<NavSnapshot>> {
        let mut conn = get_connection(&self.pool)?;

        let row = nav_history::table
            .filter(nav_history::account_id.eq(account_id))
            .select(NavSnapshotDB::as_select())
            .order(nav_history::recorded_at.desc())
            .first::<NavSnapshotDB>(&mut conn)
            .optional()?;

        Ok(row.map(NavSnapshot::from))
    }
}
