use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::accounts::AccountRepositoryTrait;
use crate::adjustment::AdjustmentService;
use crate::benchmark::BenchmarkService;
use crate::context::ServiceContext;
use crate::errors::{Error, Result};
use crate::ingestion::{IngestionService, SourceError};
use crate::market_data::{MarketDataError, OracleService};
use crate::navs::{NavService, NavSource};
use crate::rebalancing::RebalancingService;
use crate::utils::retry::with_retry;

use super::monitor_model::{AccountOutcome, MonitorRunSummary};
use super::run_lock::RunLockRepositoryTrait;

/// Cron-facing batch orchestrator. Accounts are processed in parallel but
/// each account's ingestion -> adjustment -> rebalance pipeline runs under
/// its own lock, and overlapping batch runs are excluded by a process-wide
/// run lock with a staleness timeout.
pub struct MonitorService {
    accounts: Arc<dyn AccountRepositoryTrait>,
    ingestion: Arc<IngestionService>,
    adjustment: Arc<AdjustmentService>,
    rebalancing: Arc<RebalancingService>,
    benchmark: Arc<BenchmarkService>,
    navs: Arc<NavService>,
    nav_source: Arc<dyn NavSource>,
    oracle: Arc<OracleService>,
    run_lock: Arc<dyn RunLockRepositoryTrait>,
    account_locks: DashMap<String, Arc<Mutex<()>>>,
    ctx: ServiceContext,
}

impl MonitorService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountRepositoryTrait>,
        ingestion: Arc<IngestionService>,
        adjustment: Arc<AdjustmentService>,
        rebalancing: Arc<RebalancingService>,
        benchmark: Arc<BenchmarkService>,
        navs: Arc<NavService>,
        nav_source: Arc<dyn NavSource>,
        oracle: Arc<OracleService>,
        run_lock: Arc<dyn RunLockRepositoryTrait>,
        ctx: ServiceContext,
    ) -> Self {
        Self {
            accounts,
            ingestion,
            adjustment,
            rebalancing,
            benchmark,
            navs,
            nav_source,
            oracle,
            run_lock,
            account_locks: DashMap::new(),
            ctx,
        }
    }

    /// Runs one monitoring cycle over all active accounts. Per-account
    /// failures are contained at the account boundary; the batch itself
    /// fails only when the account list cannot be loaded.
    pub async fn run_cycle(&self) -> Result<MonitorRunSummary> {
        let started_at = self.ctx.now();
        let config = &self.ctx.config;

        let holder = Uuid::new_v4().to_string();
        if !self
            .run_lock
            .try_acquire(&holder, config.run_lock_stale_after)?
        {
            info!("Previous monitoring run still active, skipping this cycle");
            return Ok(MonitorRunSummary::lock_skipped(started_at));
        }

        let accounts = match self.accounts.get_active_accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                self.release_lock(&holder);
                return Err(e);
            }
        };
        info!("Monitoring cycle started for {} accounts", accounts.len());

        let outcomes = join_all(accounts.iter().map(|account| {
            let account_id = account.id.clone();
            async move {
                let outcome = match tokio::time::timeout(
                    config.batch_deadline,
                    self.process_account(&account_id),
                )
                .await
                {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        error!("Account {} failed this cycle: {}", account_id, e);
                        AccountOutcome::Failed(e.to_string())
                    }
                    Err(_) => {
                        warn!(
                            "Account {} abandoned at the batch deadline ({:?})",
                            account_id, config.batch_deadline
                        );
                        AccountOutcome::TimedOut
                    }
                };
                (account_id, outcome)
            }
        }))
        .await;

        self.release_lock(&holder);

        let summary = MonitorRunSummary {
            started_at,
            finished_at: self.ctx.now(),
            outcomes,
            lock_skipped: false,
        };
        info!(
            "Monitoring cycle finished: {} processed, {} failed",
            summary.processed_count(),
            summary.failed_count()
        );
        Ok(summary)
    }

    async fn process_account(&self, account_id: &str) -> Result<AccountOutcome> {
        let lock = self
            .account_locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Everything this tick does is priced off one pair fetch; if the
        // oracle is down the whole tick is skipped and retried next cycle.
        let prices = match self.oracle.get_price_pair().await {
            Ok(prices) => prices,
            Err(Error::MarketData(MarketDataError::PriceUnavailable)) => {
                warn!("Prices unavailable, skipping account {} this tick", account_id);
                return Ok(AccountOutcome::Skipped("prices unavailable".to_string()));
            }
            Err(e) => return Err(e),
        };

        let nav = self.fetch_nav(account_id).await;

        if self.benchmark.get_state_snapshot(account_id)?.is_none() {
            let Some(nav) = nav else {
                debug!(
                    "Account {} has no NAV reading yet, deferring initialization",
                    account_id
                );
                return Ok(AccountOutcome::Skipped("no NAV reading yet".to_string()));
            };
            self.rebalancing.initialize(account_id, nav, &prices)?;
        }

        let summary = self.ingestion.sync_account(account_id).await?;
        if !summary.unapplied_event_ids.is_empty() {
            self.adjustment.apply_net_cashflow(
                account_id,
                summary.net_cashflow_usd,
                &prices,
                &summary.unapplied_event_ids,
            )?;
        }
        // Only reached when recording and application both succeeded
        self.ingestion.commit_checkpoint(account_id, &summary)?;

        self.rebalancing.tick(account_id, &prices)?;

        if let Some(nav) = nav {
            let benchmark_value = self.benchmark.get_benchmark_value(account_id, &prices)?;
            self.navs.record(account_id, nav, benchmark_value, &prices)?;
        }

        Ok(AccountOutcome::Processed)
    }

    async fn fetch_nav(&self, account_id: &str) -> Option<Decimal> {
        let config = &self.ctx.config;
        let result = with_retry(
            "NAV source",
            config.source_retries,
            config.retry_backoff,
            || async {
                tokio::time::timeout(
                    config.source_timeout,
                    self.nav_source.fetch_nav(account_id),
                )
                .await
                .map_err(|_| SourceError::TimedOut(config.source_timeout))?
            },
        )
        .await;

        match result {
            Ok(nav) => Some(nav),
            Err(e) => {
                warn!("NAV reading unavailable for account {}: {}", account_id, e);
                None
            }
        }
    }

    fn release_lock(&self, holder: &str) {
        if let Err(e) = self.run_lock.release(holder) {
            error!("Failed to release run lock: {}", e);
        }
    }
}
