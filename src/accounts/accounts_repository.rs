use diesel::prelude::*;
use std::sync::Arc;

use crate::db::{get_connection, DbPool};
use crate::errors::Result;
use crate::schema::accounts;

use super::accounts_model::{Account, AccountDB, NewAccount};
use super::accounts_traits::AccountRepositoryTrait;

/// Repository for managing account rows in the database
pub struct AccountRepository {
    pool: Arc<DbPool>,
}

impl AccountRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl AccountRepositoryTrait for AccountRepository {
    fn get_active_accounts(&self) -> Result<Vec<Account>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = accounts::table
            .filter(accounts::is_active.eq(true))
            .select(AccountDB::as_select())
            .order(accounts::id.asc())
            .load::<AccountDB>(&mut conn)?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    fn get_by_id(&self, account_id: &str) -> Result<Option<Account>> {
        let mut conn = get_connection(&self.pool)?;

        let row = accounts::table
            .find(account_id)
            .select(AccountDB::as_select())
            .first::<AccountDB>(&mut conn)
            .optional()?;

        Ok(row.map(Account::from))
    }

    fn create_account(&self, new_account: NewAccount) -> Result<Account> {
        new_account.validate()?;
        let mut conn = get_connection(&self.pool)?;

        let db: AccountDB = new_account.into();
        diesel::insert_into(accounts::table)
            .values(&db)
            .execute(&mut conn)?;

        Ok(Account::from(db))
    }
}
