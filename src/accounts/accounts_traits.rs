use crate::errors::Result;

use super::accounts_model::{Account, NewAccount};

/// Trait defining the contract for account repository operations.
pub trait AccountRepositoryTrait: Send + Sync {
    fn get_active_accounts(&self) -> Result<Vec<Account>>;
    fn get_by_id(&self, account_id: &str) -> Result<Option<Account>>;
    fn create_account(&self, new_account: NewAccount) -> Result<Account>;
}
