use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ingestion_errors::SourceError;
use super::ingestion_model::{RawRecord, SourceKind};

/// One upstream transaction history endpoint. Implementations return an
/// empty list when there is nothing new and raise `SourceError::Unavailable`
/// only on true transport or auth failure.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch_since(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>, SourceError>;
}
