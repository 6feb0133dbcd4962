use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::constants::USD_ASSETS;
use crate::context::ServiceContext;
use crate::errors::Result;
use crate::ledger::{CashflowEvent, LedgerRepositoryTrait};
use crate::market_data::{MarketDataError, OracleService};
use crate::utils::retry::with_retry;

use super::ingestion_errors::SourceError;
use super::ingestion_model::{normalize, IngestionSummary, RawRecord, SourceKind};
use super::ingestion_traits::TransactionSource;

/// Polls every upstream transaction source since the account's checkpoint,
/// normalizes and deduplicates the results into the event ledger, and
/// computes the net USD cashflow awaiting application.
pub struct IngestionService {
    sources: Vec<Arc<dyn TransactionSource>>,
    ledger: Arc<dyn LedgerRepositoryTrait>,
    oracle: Arc<OracleService>,
    ctx: ServiceContext,
}

impl IngestionService {
    pub fn new(
        sources: Vec<Arc<dyn TransactionSource>>,
        ledger: Arc<dyn LedgerRepositoryTrait>,
        oracle: Arc<OracleService>,
        ctx: ServiceContext,
    ) -> Self {
        Self {
            sources,
            ledger,
            oracle,
            ctx,
        }
    }

    pub async fn sync_account(&self, account_id: &str) -> Result<IngestionSummary> {
        let since = self
            .ledger
            .get_checkpoint(account_id)?
            .and_then(|c| c.last_processed_at)
            .unwrap_or(self.ctx.config.history_start);

        let mut summary = IngestionSummary::default();

        // Each source is polled independently; one failing source must not
        // abort the others.
        let fetches = join_all(self.sources.iter().map(|source| {
            let kind = source.kind();
            async move { (kind, self.fetch_source(source.as_ref(), account_id, since).await) }
        }))
        .await;

        let mut events: Vec<CashflowEvent> = Vec::new();
        for (kind, result) in fetches {
            match result {
                Ok(raws) => {
                    debug!(
                        "Source {} returned {} records for account {} since {}",
                        kind,
                        raws.len(),
                        account_id,
                        since
                    );
                    summary.fetched += raws.len();
                    self.normalize_batch(account_id, kind, &raws, &mut events, &mut summary);
                }
                Err(e) => {
                    warn!(
                        "Source {} unavailable for account {}: {}. Treating as zero events this cycle",
                        kind, account_id, e
                    );
                    summary.failed_sources.push(kind);
                }
            }
        }

        self.resolve_usd_values(&mut events, &mut summary).await?;

        for event in &events {
            if self.ledger.insert_event_if_absent(event)? {
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
            summary.max_event_time = Some(match summary.max_event_time {
                Some(t) if t >= event.event_time => t,
                _ => event.event_time,
            });
        }

        // Net over everything recorded but not yet applied, not just this
        // batch: a previously failed application is picked up again here.
        let unapplied = self.ledger.get_unapplied_events(account_id)?;
        summary.net_cashflow_usd = unapplied.iter().filter_map(|e| e.signed_usd()).sum();
        summary.unapplied_event_ids = unapplied.iter().map(|e| e.external_id.clone()).collect();

        let attempt_error = if summary.all_sources_ok() {
            None
        } else {
            Some(format!(
                "sources unavailable: {}",
                summary
                    .failed_sources
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        };
        self.ledger
            .record_attempt(account_id, attempt_error.as_deref())?;

        info!(
            "Ingestion for account {}: fetched={} inserted={} duplicates={} rejected={} price_missing={} net={} USD",
            account_id,
            summary.fetched,
            summary.inserted,
            summary.duplicates,
            summary.rejected,
            summary.price_missing,
            summary.net_cashflow_usd
        );

        Ok(summary)
    }

    /// Moves the checkpoint to the newest fetched event timestamp, but only
    /// when every source responded and the batch has been fully applied.
    pub fn commit_checkpoint(&self, account_id: &str, summary: &IngestionSummary) -> Result<()> {
        if !summary.all_sources_ok() {
            debug!(
                "Holding checkpoint for account {}: {} source(s) failed this cycle",
                account_id,
                summary.failed_sources.len()
            );
            return Ok(());
        }
        if let Some(processed_through) = summary.max_event_time {
            self.ledger.advance_checkpoint(account_id, processed_through)?;
        }
        Ok(())
    }

    async fn fetch_source(
        &self,
        source: &dyn TransactionSource,
        account_id: &str,
        since: chrono::DateTime<chrono::Utc>,
    ) -> std::result::Result<Vec<RawRecord>, SourceError> {
        let config = &self.ctx.config;
        with_retry(
            source.kind().as_str(),
            config.source_retries,
            config.retry_backoff,
            || async {
                tokio::time::timeout(config.source_timeout, source.fetch_since(account_id, since))
                    .await
                    .map_err(|_| SourceError::TimedOut(config.source_timeout))?
            },
        )
        .await
    }

    fn normalize_batch(
        &self,
        account_id: &str,
        kind: SourceKind,
        raws: &[RawRecord],
        events: &mut Vec<CashflowEvent>,
        summary: &mut IngestionSummary,
    ) {
        let now = self.ctx.now();
        for raw in raws {
            match normalize(account_id, raw, now) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(
                        "Rejected record {} from source {} for account {}: {}",
                        raw.id(),
                        kind,
                        account_id,
                        e
                    );
                    summary.rejected += 1;
                }
            }
        }
    }

    /// Resolves each event's USD value at the current oracle price. Events
    /// whose asset cannot be priced keep `usd_value = None` and are excluded
    /// from the net total.
    async fn resolve_usd_values(
        &self,
        events: &mut [CashflowEvent],
        summary: &mut IngestionSummary,
    ) -> Result<()> {
        let mut assets: Vec<String> = events
            .iter()
            .map(|e| e.asset.clone())
            .filter(|a| !USD_ASSETS.contains(&a.as_str()))
            .collect();
        assets.sort();
        assets.dedup();

        let prices: HashMap<String, Decimal> = if assets.is_empty() {
            HashMap::new()
        } else {
            match self.oracle.get_prices(&assets).await {
                Ok(prices) => prices,
                // None of the requested assets resolved; the affected events
                // are flagged price-missing below. A wholesale oracle outage
                // is caught earlier, before ingestion starts.
                Err(crate::errors::Error::MarketData(MarketDataError::PriceUnavailable)) => {
                    HashMap::new()
                }
                Err(e) => return Err(e),
            }
        };

        for event in events.iter_mut() {
            if USD_ASSETS.contains(&event.asset.as_str()) {
                event.usd_value = Some(event.raw_amount);
                continue;
            }
            match prices.get(&event.asset) {
                Some(price) => {
                    event.usd_value = Some(event.raw_amount * price);
                }
                None => {
                    warn!(
                        "No price for asset {} on event {}; excluding it from the cashflow total",
                        event.asset, event.external_id
                    );
                    summary.price_missing += 1;
                }
            }
        }

        Ok(())
    }
}
