use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One value that did not survive replay, anchored to the offending record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    /// None when the mismatch is against the live state rather than a
    /// specific record.
    pub record_id: Option<String>,
    pub field: String,
    pub expected: Decimal,
    pub actual: Decimal,
}

/// Outcome of replaying an account's full history against its live state.
/// Diagnostic only; the validator never repairs anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub account_id: String,
    pub is_consistent: bool,
    pub discrepancies: Vec<Discrepancy>,
    pub replayed_records: usize,
}
