use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Direction of an external cashflow relative to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventDirection {
    In,
    Out,
}

impl EventDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventDirection::In => DIRECTION_IN,
            EventDirection::Out => DIRECTION_OUT,
        }
    }
}

impl FromStr for EventDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            DIRECTION_IN => Ok(EventDirection::In),
            DIRECTION_OUT => Ok(EventDirection::Out),
            _ => Err(format!("Unknown event direction: {}", s)),
        }
    }
}

/// Upstream source kind an event was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Regular,
    SubTransfer,
    Pay,
    Dividend,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Regular => EVENT_KIND_REGULAR,
            EventKind::SubTransfer => EVENT_KIND_SUB_TRANSFER,
            EventKind::Pay => EVENT_KIND_PAY,
            EventKind::Dividend => EVENT_KIND_DIVIDEND,
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            EVENT_KIND_REGULAR => Ok(EventKind::Regular),
            EVENT_KIND_SUB_TRANSFER => Ok(EventKind::SubTransfer),
            EVENT_KIND_PAY => Ok(EventKind::Pay),
            EVENT_KIND_DIVIDEND => Ok(EventKind::Dividend),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}

/// Canonical cashflow event. Immutable once ingested; keyed by
/// `(account_id, external_id)` so re-polling an overlapping upstream window
/// cannot produce a second row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CashflowEvent {
    pub account_id: String,
    /// Upstream transaction id, unique per account and source.
    pub external_id: String,
    pub direction: EventDirection,
    pub kind: EventKind,
    pub asset: String,
    pub raw_amount: Decimal,
    /// None when no price could be resolved; such events are excluded from
    /// the net cashflow total.
    pub usd_value: Option<Decimal>,
    pub event_time: DateTime<Utc>,
    /// True for transfers between accounts under common control.
    pub internal: bool,
    /// Set once the event's value has been consumed by a modification.
    pub applied: bool,
    pub created_at: DateTime<Utc>,
}

impl CashflowEvent {
    pub fn is_price_missing(&self) -> bool {
        self.usd_value.is_none()
    }

    /// Signed USD contribution to the net cashflow (None if price missing).
    pub fn signed_usd(&self) -> Option<Decimal> {
        self.usd_value.map(|v| match self.direction {
            EventDirection::In => v,
            EventDirection::Out => -v,
        })
    }
}

/// Database model for cashflow events
#[derive(Queryable, Selectable, Identifiable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::cashflow_events)]
#[diesel(primary_key(account_id, external_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CashflowEventDB {
    pub account_id: String,
    pub external_id: String,
    pub direction: String,
    pub kind: String,
    pub asset: String,
    pub raw_amount: String,
    pub usd_value: Option<String>,
    pub event_time: NaiveDateTime,
    pub is_internal: bool,
    pub applied: bool,
    pub created_at: NaiveDateTime,
}

/// Append-only record of one cashflow application to the benchmark basket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModificationRecord {
    pub id: String,
    pub account_id: String,
    pub recorded_at: DateTime<Utc>,
    pub cashflow_usd: Decimal,
    pub btc_units_before: Decimal,
    pub btc_units_after: Decimal,
    pub eth_units_before: Decimal,
    pub eth_units_after: Decimal,
    pub btc_price: Decimal,
    pub eth_price: Decimal,
    pub source_event_ids: Vec<String>,
}

/// Database model for modification records
#[derive(Queryable, Selectable, Identifiable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::benchmark_modifications)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ModificationRecordDB {
    pub id: String,
    pub account_id: String,
    pub recorded_at: NaiveDateTime,
    pub cashflow_usd: String,
    pub btc_units_before: String,
    pub btc_units_after: String,
    pub eth_units_before: String,
    pub eth_units_after: String,
    pub btc_price: String,
    pub eth_price: String,
    pub source_event_ids: String,
}

/// Outcome of a rebalance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceStatus {
    Success,
    Failed,
}

impl RebalanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebalanceStatus::Success => REBALANCE_STATUS_SUCCESS,
            RebalanceStatus::Failed => REBALANCE_STATUS_FAILED,
        }
    }
}

impl FromStr for RebalanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            REBALANCE_STATUS_SUCCESS => Ok(RebalanceStatus::Success),
            REBALANCE_STATUS_FAILED => Ok(RebalanceStatus::Failed),
            _ => Err(format!("Unknown rebalance status: {}", s)),
        }
    }
}

/// Append-only record of a rebalance attempt. Failed attempts carry no
/// numeric fields when the failure happened before prices were known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRecord {
    pub id: String,
    pub account_id: String,
    pub recorded_at: DateTime<Utc>,
    pub total_value_before: Option<Decimal>,
    pub btc_price: Option<Decimal>,
    pub eth_price: Option<Decimal>,
    pub btc_units_before: Option<Decimal>,
    pub btc_units_after: Option<Decimal>,
    pub eth_units_before: Option<Decimal>,
    pub eth_units_after: Option<Decimal>,
    pub status: RebalanceStatus,
    pub error: Option<String>,
}

/// Database model for rebalance records
#[derive(Queryable, Selectable, Identifiable, Insertable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::benchmark_rebalances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RebalanceRecordDB {
    pub id: String,
    pub account_id: String,
    pub recorded_at: NaiveDateTime,
    pub total_value_before: Option<String>,
    pub btc_price: Option<String>,
    pub eth_price: Option<String>,
    pub btc_units_before: Option<String>,
    pub btc_units_after: Option<String>,
    pub eth_units_before: Option<String>,
    pub eth_units_after: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

/// One entry of the merged per-account history, in timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntry {
    Modification(ModificationRecord),
    Rebalance(RebalanceRecord),
}

impl LedgerEntry {
    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEntry::Modification(m) => m.recorded_at,
            LedgerEntry::Rebalance(r) => r.recorded_at,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LedgerEntry::Modification(m) => &m.id,
            LedgerEntry::Rebalance(r) => &r.id,
        }
    }
}

/// Timestamp boundary up to which an account's upstream history has been
/// fully ingested and applied, plus attempt bookkeeping for operators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingCheckpoint {
    pub account_id: String,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Database model for processing checkpoints
#[derive(Queryable, Selectable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::processing_checkpoints)]
#[diesel(primary_key(account_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProcessingCheckpointDB {
    pub account_id: String,
    pub last_processed_at: Option<NaiveDateTime>,
    pub last_attempted_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// --- Conversions ---

fn parse_decimal(field: &str, raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        log::error!("Failed to parse stored decimal {} '{}': {}", field, raw, e);
        Decimal::ZERO
    })
}

fn parse_decimal_opt(field: &str, raw: &Option<String>) -> Option<Decimal> {
    raw.as_ref().map(|s| parse_decimal(field, s))
}

impl From<CashflowEventDB> for CashflowEvent {
    fn from(db: CashflowEventDB) -> Self {
        Self {
            direction: EventDirection::from_str(&db.direction).unwrap_or_else(|e| {
                log::error!("{}", e);
                EventDirection::In
            }),
            kind: EventKind::from_str(&db.kind).unwrap_or_else(|e| {
                log::error!("{}", e);
                EventKind::Regular
            }),
            raw_amount: parse_decimal("raw_amount", &db.raw_amount),
            usd_value: parse_decimal_opt("usd_value", &db.usd_value),
            event_time: DateTime::from_naive_utc_and_offset(db.event_time, Utc),
            created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
            account_id: db.account_id,
            external_id: db.external_id,
            asset: db.asset,
            internal: db.is_internal,
            applied: db.applied,
        }
    }
}

impl From<&CashflowEvent> for CashflowEventDB {
    fn from(domain: &CashflowEvent) -> Self {
        Self {
            account_id: domain.account_id.clone(),
            external_id: domain.external_id.clone(),
            direction: domain.direction.as_str().to_string(),
            kind: domain.kind.as_str().to_string(),
            asset: domain.asset.clone(),
            raw_amount: domain.raw_amount.to_string(),
            usd_value: domain.usd_value.map(|v| v.to_string()),
            event_time: domain.event_time.naive_utc(),
            is_internal: domain.internal,
            applied: domain.applied,
            created_at: domain.created_at.naive_utc(),
        }
    }
}

impl From<ModificationRecordDB> for ModificationRecord {
    fn from(db: ModificationRecordDB) -> Self {
        Self {
            recorded_at: DateTime::from_naive_utc_and_offset(db.recorded_at, Utc),
            cashflow_usd: parse_decimal("cashflow_usd", &db.cashflow_usd),
            btc_units_before: parse_decimal("btc_units_before", &db.btc_units_before),
            btc_units_after: parse_decimal("btc_units_after", &db.btc_units_after),
            eth_units_before: parse_decimal("eth_units_before", &db.eth_units_before),
            eth_units_after: parse_decimal("eth_units_after", &db.eth_units_after),
            btc_price: parse_decimal("btc_price", &db.btc_price),
            eth_price: parse_decimal("eth_price", &db.eth_price),
            source_event_ids: serde_json::from_str(&db.source_event_ids).unwrap_or_else(|e| {
                log::error!("Failed to parse source_event_ids: {}", e);
                Vec::new()
            }),
            id: db.id,
            account_id: db.account_id,
        }
    }
}

impl From<&ModificationRecord> for ModificationRecordDB {
    fn from(domain: &ModificationRecord) -> Self {
        Self {
            id: domain.id.clone(),
            account_id: domain.account_id.clone(),
            recorded_at: domain.recorded_at.naive_utc(),
            cashflow_usd: domain.cashflow_usd.to_string(),
            btc_units_before: domain.btc_units_before.to_string(),
            btc_units_after: domain.btc_units_after.to_string(),
            eth_units_before: domain.eth_units_before.to_string(),
            eth_units_after: domain.eth_units_after.to_string(),
            btc_price: domain.btc_price.to_string(),
            eth_price: domain.eth_price.to_string(),
            source_event_ids: serde_json::to_string(&domain.source_event_ids)
                .unwrap_or_else(|_| "[]".to_string()),
        }
    }
}

impl From<RebalanceRecordDB> for RebalanceRecord {
    fn from(db: RebalanceRecordDB) -> Self {
        Self {
            recorded_at: DateTime::from_naive_utc_and_offset(db.recorded_at, Utc),
            total_value_before: parse_decimal_opt("total_value_before", &db.total_value_before),
            btc_price: parse_decimal_opt("btc_price", &db.btc_price),
            eth_price: parse_decimal_opt("eth_price", &db.eth_price),
            btc_units_before: parse_decimal_opt("btc_units_before", &db.btc_units_before),
            btc_units_after: parse_decimal_opt("btc_units_after", &db.btc_units_after),
            eth_units_before: parse_decimal_opt("eth_units_before", &db.eth_units_before),
            eth_units_after: parse_decimal_opt("eth_units_after", &db.eth_units_after),
            status: RebalanceStatus::from_str(&db.status).unwrap_or_else(|e| {
                log::error!("{}", e);
                RebalanceStatus::Failed
            }),
            error: db.error,
            id: db.id,
            account_id: db.account_id,
        }
    }
}

impl From<&RebalanceRecord> for RebalanceRecordDB {
    fn from(domain: &RebalanceRecord) -> Self {
        Self {
            id: domain.id.clone(),
            account_id: domain.account_id.clone(),
            recorded_at: domain.recorded_at.naive_utc(),
            total_value_before: domain.total_value_before.map(|v| v.to_string()),
            btc_price: domain.btc_price.map(|v| v.to_string()),
            eth_price: domain.eth_price.map(|v| v.to_string()),
            btc_units_before: domain.btc_units_before.map(|v| v.to_string()),
            btc_units_after: domain.btc_units_after.map(|v| v.to_string()),
            eth_units_before: domain.eth_units_before.map(|v| v.to_string()),
            eth_units_after: domain.eth_units_after.map(|v| v.to_string()),
            status: domain.status.as_str().to_string(),
            error: domain.error.clone(),
        }
    }
}

impl From<ProcessingCheckpointDB> for ProcessingCheckpoint {
    fn from(db: ProcessingCheckpointDB) -> Self {
        Self {
            account_id: db.account_id,
            last_processed_at: db
                .last_processed_at
                .map(|t| DateTime::from_naive_utc_and_offset(t, Utc)),
            last_attempted_at: db
                .last_attempted_at
                .map(|t| DateTime::from_naive_utc_and_offset(t, Utc)),
            last_error: db.last_error,
        }
    }
}
