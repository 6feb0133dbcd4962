use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{CashflowEvent, EventDirection, EventKind};

use super::ingestion_errors::SourceError;

/// The upstream source families polled each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Regular deposit/withdrawal history.
    Transfers,
    /// Transfers between sub-accounts under common control.
    SubTransfers,
    /// Peer-payment transactions.
    PayTransactions,
    /// Dividend / distribution records.
    Dividends,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Transfers => "TRANSFERS",
            SourceKind::SubTransfers => "SUB_TRANSFERS",
            SourceKind::PayTransactions => "PAY_TRANSACTIONS",
            SourceKind::Dividends => "DIVIDENDS",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw record from the regular deposit/withdrawal history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    pub id: String,
    /// "DEPOSIT" or "WITHDRAWAL"
    pub flow: String,
    pub asset: String,
    pub amount: Decimal,
    /// Only "COMPLETED" transfers become events.
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

/// Raw record from the sub-account transfer endpoint. The same upstream
/// record is seen by both accounts involved; each side normalizes its own
/// event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubTransfer {
    pub id: String,
    pub from_account: String,
    pub to_account: String,
    pub asset: String,
    pub amount: Decimal,
    pub transferred_at: DateTime<Utc>,
}

/// Raw record from the peer-payment endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPayTransaction {
    pub id: String,
    /// "SEND" or "RECEIVE"
    pub flow: String,
    pub asset: String,
    pub amount: Decimal,
    pub counterparty: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// Raw record from the dividend/distribution endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDividend {
    pub id: String,
    pub payout_asset: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Tagged union over the per-source payload shapes. One strict
/// normalization path per variant; anything that does not map cleanly is
/// rejected with a reason rather than guessed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawRecord {
    Transfer(RawTransfer),
    SubTransfer(RawSubTransfer),
    Pay(RawPayTransaction),
    Dividend(RawDividend),
}

impl RawRecord {
    pub fn id(&self) -> &str {
        match self {
            RawRecord::Transfer(r) => &r.id,
            RawRecord::SubTransfer(r) => &r.id,
            RawRecord::Pay(r) => &r.id,
            RawRecord::Dividend(r) => &r.id,
        }
    }
}

/// Normalizes one raw upstream record into the canonical event for
/// `account_id`. `usd_value` is left unresolved; the ingestion service
/// fills it from the price oracle afterwards.
pub fn normalize(
    account_id: &str,
    raw: &RawRecord,
    now: DateTime<Utc>,
) -> Result<CashflowEvent, SourceError> {
    match raw {
        RawRecord::Transfer(r) => normalize_transfer(account_id, r, now),
        RawRecord::SubTransfer(r) => normalize_sub_transfer(account_id, r, now),
        RawRecord::Pay(r) => normalize_pay(account_id, r, now),
        RawRecord::Dividend(r) => normalize_dividend(account_id, r, now),
    }
}

fn require_positive_amount(id: &str, amount: Decimal) -> Result<(), SourceError> {
    if amount <= Decimal::ZERO {
        return Err(SourceError::InvalidRecord(format!(
            "record {} has non-positive amount {}",
            id, amount
        )));
    }
    Ok(())
}

fn normalize_transfer(
    account_id: &str,
    raw: &RawTransfer,
    now: DateTime<Utc>,
) -> Result<CashflowEvent, SourceError> {
    if raw.status != "COMPLETED" {
        return Err(SourceError::InvalidRecord(format!(
            "transfer {} has status {}, only COMPLETED transfers are ingested",
            raw.id, raw.status
        )));
    }
    require_positive_amount(&raw.id, raw.amount)?;

    let direction = match raw.flow.as_str() {
        "DEPOSIT" => EventDirection::In,
        "WITHDRAWAL" => EventDirection::Out,
        other => {
            return Err(SourceError::InvalidRecord(format!(
                "transfer {} has unknown flow {}",
                raw.id, other
            )))
        }
    };

    Ok(CashflowEvent {
        account_id: account_id.to_string(),
        external_id: raw.id.clone(),
        direction,
        kind: EventKind::Regular,
        asset: raw.asset.clone(),
        raw_amount: raw.amount,
        usd_value: None,
        event_time: raw.completed_at,
        internal: false,
        applied: false,
        created_at: now,
    })
}

fn normalize_sub_transfer(
    account_id: &str,
    raw: &RawSubTransfer,
    now: DateTime<Utc>,
) -> Result<CashflowEvent, SourceError> {
    require_positive_amount(&raw.id, raw.amount)?;
    if raw.from_account == raw.to_account {
        return Err(SourceError::InvalidRecord(format!(
            "sub-transfer {} has identical sender and receiver {}",
            raw.id, raw.from_account
        )));
    }

    let direction = if raw.from_account == account_id {
        EventDirection::Out
    } else if raw.to_account == account_id {
        EventDirection::In
    } else {
        return Err(SourceError::InvalidRecord(format!(
            "sub-transfer {} does not involve account {}",
            raw.id, account_id
        )));
    };

    Ok(CashflowEvent {
        account_id: account_id.to_string(),
        external_id: raw.id.clone(),
        direction,
        kind: EventKind::SubTransfer,
        asset: raw.asset.clone(),
        raw_amount: raw.amount,
        usd_value: None,
        event_time: raw.transferred_at,
        internal: true,
        applied: false,
        created_at: now,
    })
}

fn normalize_pay(
    account_id: &str,
    raw: &RawPayTransaction,
    now: DateTime<Utc>,
) -> Result<CashflowEvent, SourceError> {
    require_positive_amount(&raw.id, raw.amount)?;

    let direction = match raw.flow.as_str() {
        "RECEIVE" => EventDirection::In,
        "SEND" => EventDirection::Out,
        other => {
            return Err(SourceError::InvalidRecord(format!(
                "pay transaction {} has unknown flow {}",
                raw.id, other
            )))
        }
    };

    Ok(CashflowEvent {
        account_id: account_id.to_string(),
        external_id: raw.id.clone(),
        direction,
        kind: EventKind::Pay,
        asset: raw.asset.clone(),
        raw_amount: raw.amount,
        usd_value: None,
        event_time: raw.paid_at,
        internal: false,
        applied: false,
        created_at: now,
    })
}

fn normalize_dividend(
    account_id: &str,
    raw: &RawDividend,
    now: DateTime<Utc>,
) -> Result<CashflowEvent, SourceError> {
    require_positive_amount(&raw.id, raw.amount)?;

    Ok(CashflowEvent {
        account_id: account_id.to_string(),
        external_id: raw.id.clone(),
        direction: EventDirection::In,
        kind: EventKind::Dividend,
        asset: raw.payout_asset.clone(),
        raw_amount: raw.amount,
        usd_value: None,
        event_time: raw.paid_at,
        internal: false,
        applied: false,
        created_at: now,
    })
}

/// Outcome of one per-account ingestion pass.
#[derive(Debug, Clone, Default)]
pub struct IngestionSummary {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub price_missing: usize,
    pub failed_sources: Vec<SourceKind>,
    /// Net USD cashflow over the usd-valued, not-yet-applied events.
    pub net_cashflow_usd: Decimal,
    /// External ids of the events contributing to `net_cashflow_usd`.
    pub unapplied_event_ids: Vec<String>,
    pub max_event_time: Option<DateTime<Utc>>,
}

impl IngestionSummary {
    pub fn all_sources_ok(&self) -> bool {
        self.failed_sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn completed_deposit_becomes_inflow_event() {
        let raw = RawRecord::Transfer(RawTransfer {
            id: "DEP_12345".to_string(),
            flow: "DEPOSIT".to_string(),
            asset: "USDT".to_string(),
            amount: dec!(1000),
            status: "COMPLETED".to_string(),
            completed_at: ts(),
        });

        let event = normalize("acct-1", &raw, ts()).unwrap();
        assert_eq!(event.direction, EventDirection::In);
        assert_eq!(event.kind, EventKind::Regular);
        assert_eq!(event.external_id, "DEP_12345");
        assert!(!event.internal);
        assert!(event.usd_value.is_none());
    }

    #[test]
    fn pending_transfer_is_rejected() {
        let raw = RawRecord::Transfer(RawTransfer {
            id: "DEP_1".to_string(),
            flow: "DEPOSIT".to_string(),
            asset: "BTC".to_string(),
            amount: dec!(0.5),
            status: "PENDING".to_string(),
            completed_at: ts(),
        });

        assert!(matches!(
            normalize("acct-1", &raw, ts()),
            Err(SourceError::InvalidRecord(_))
        ));
    }

    #[test]
    fn unknown_flow_is_rejected_not_guessed() {
        let raw = RawRecord::Transfer(RawTransfer {
            id: "T_1".to_string(),
            flow: "REBATE".to_string(),
            asset: "USDT".to_string(),
            amount: dec!(10),
            status: "COMPLETED".to_string(),
            completed_at: ts(),
        });

        assert!(normalize("acct-1", &raw, ts()).is_err());
    }

    #[test]
    fn sub_transfer_resolves_each_side() {
        let raw = RawRecord::SubTransfer(RawSubTransfer {
            id: "ST_77".to_string(),
            from_account: "master".to_string(),
            to_account: "sub-a".to_string(),
            asset: "ETH".to_string(),
            amount: dec!(2),
            transferred_at: ts(),
        });

        let sender = normalize("master", &raw, ts()).unwrap();
        let receiver = normalize("sub-a", &raw, ts()).unwrap();

        assert_eq!(sender.direction, EventDirection::Out);
        assert_eq!(receiver.direction, EventDirection::In);
        assert!(sender.internal && receiver.internal);
        assert_eq!(sender.external_id, receiver.external_id);
    }

    #[test]
    fn sub_transfer_for_uninvolved_account_is_rejected() {
        let raw = RawRecord::SubTransfer(RawSubTransfer {
            id: "ST_78".to_string(),
            from_account: "master".to_string(),
            to_account: "sub-a".to_string(),
            asset: "ETH".to_string(),
            amount: dec!(2),
            transferred_at: ts(),
        });

        assert!(normalize("sub-b", &raw, ts()).is_err());
    }

    #[test]
    fn pay_send_is_outflow() {
        let raw = RawRecord::Pay(RawPayTransaction {
            id: "PAY_5".to_string(),
            flow: "SEND".to_string(),
            asset: "USDC".to_string(),
            amount: dec!(250),
            counterparty: Some("friend".to_string()),
            paid_at: ts(),
        });

        let event = normalize("acct-1", &raw, ts()).unwrap();
        assert_eq!(event.direction, EventDirection::Out);
        assert_eq!(event.kind, EventKind::Pay);
    }

    #[test]
    fn dividend_is_inflow() {
        let raw = RawRecord::Dividend(RawDividend {
            id: "DIV_9".to_string(),
            payout_asset: "USDT".to_string(),
            amount: dec!(12.5),
            paid_at: ts(),
        });

        let event = normalize("acct-1", &raw, ts()).unwrap();
        assert_eq!(event.direction, EventDirection::In);
        assert_eq!(event.kind, EventKind::Dividend);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let raw = RawRecord::Dividend(RawDividend {
            id: "DIV_10".to_string(),
            payout_asset: "USDT".to_string(),
            amount: Decimal::ZERO,
            paid_at: ts(),
        });

        assert!(normalize("acct-1", &raw, ts()).is_err());
    }
}
