use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::Result;
use crate::ingestion::SourceError;

use super::nav_model::NavSnapshot;

/// Upstream reading of the account's realized net asset value. The first
/// successful reading triggers benchmark initialization.
#[async_trait]
pub trait NavSource: Send + Sync {
    async fn fetch_nav(&self, account_id: &str) -> std::result::Result<Decimal, SourceError>;
}

/// Trait defining the contract for NAV history persistence.
pub trait NavRepositoryTrait: Send + Sync {
    fn append(&self, snapshot: &NavSnapshot) -> Result<()>;
    fn get_history(&self, account_id: &str) -> Result<Vec<NavSnapshot>>;
    fn get_latest(&self, account_id: &str) -> Result<Option<NavSnapshot>>;
}
