use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::errors::{Error, Result};

/// Source of "now" for every component. Injected so scheduling and record
/// timestamps are deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Engine-wide configuration. All time values are UTC.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Target basket weights; must sum to 1.
    pub btc_weight: Decimal,
    pub eth_weight: Decimal,

    /// Weekly rebalance slot (weekday + hour, UTC).
    pub rebalance_weekday: Weekday,
    pub rebalance_hour: u32,

    /// Bounds for upstream transaction-source calls.
    pub source_timeout: Duration,
    pub source_retries: u32,

    /// Bounds for price oracle calls.
    pub oracle_timeout: Duration,
    pub oracle_retries: u32,

    /// Base delay between retries, doubled per attempt.
    pub retry_backoff: Duration,

    /// Wall-clock deadline for one monitoring cycle.
    pub batch_deadline: Duration,

    /// Age after which a held run lock is considered abandoned.
    pub run_lock_stale_after: Duration,

    /// Lower bound for upstream history polling when no checkpoint exists.
    pub history_start: DateTime<Utc>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            btc_weight: dec!(0.5),
            eth_weight: dec!(0.5),
            rebalance_weekday: Weekday::Mon,
            rebalance_hour: 0,
            source_timeout: Duration::from_secs(10),
            source_retries: 2,
            oracle_timeout: Duration::from_secs(10),
            oracle_retries: 2,
            retry_backoff: Duration::from_millis(500),
            batch_deadline: Duration::from_secs(300),
            run_lock_stale_after: Duration::from_secs(900),
            history_start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.btc_weight < Decimal::ZERO || self.eth_weight < Decimal::ZERO {
            return Err(Error::Validation(
                "Target weights cannot be negative".to_string(),
            ));
        }
        if self.btc_weight + self.eth_weight != Decimal::ONE {
            return Err(Error::Validation(format!(
                "Target weights must sum to 1, got {}",
                self.btc_weight + self.eth_weight
            )));
        }
        if self.rebalance_hour > 23 {
            return Err(Error::Validation(format!(
                "Rebalance hour must be 0-23, got {}",
                self.rebalance_hour
            )));
        }
        Ok(())
    }
}

/// Explicit context passed into every service constructor: configuration and
/// clock, no module-level state.
#[derive(Clone)]
pub struct ServiceContext {
    pub config: EngineConfig,
    pub clock: Arc<dyn Clock>,
}

impl ServiceContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let config = EngineConfig {
            btc_weight: dec!(0.6),
            eth_weight: dec!(0.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_hour() {
        let config = EngineConfig {
            rebalance_hour: 24,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
