use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How one account fared in a monitoring cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "outcome", content = "detail")]
pub enum AccountOutcome {
    Processed,
    /// Nothing to do yet or inputs unavailable; retried next cycle.
    Skipped(String),
    /// The account's pipeline failed; other accounts were unaffected.
    Failed(String),
    /// Abandoned at the batch deadline; retried next cycle.
    TimedOut,
}

/// Result of one monitoring cycle over the full account set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<(String, AccountOutcome)>,
    /// True when the cycle was skipped because a previous run still held
    /// the lock.
    pub lock_skipped: bool,
}

impl MonitorRunSummary {
    pub fn lock_skipped(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            outcomes: Vec::new(),
            lock_skipped: true,
        }
    }

    pub fn processed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, AccountOutcome::Processed))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, AccountOutcome::Failed(_)))
            .count()
    }
}
