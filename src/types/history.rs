//! Vendor history view derived from the prediction log

use crate::types::prediction::PredictionRecord;
use serde::{Deserialize, Serialize};

/// Condensed view of one stored transaction for a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorTransaction {
    pub amount: f64,
    pub risk_score: u8,
    pub fraud_score: f64,
    pub timestamp: String,
    pub agency: String,
    pub is_anomaly: bool,
}

impl From<&PredictionRecord> for VendorTransaction {
    fn from(record: &PredictionRecord) -> Self {
        Self {
            amount: record.input.amount,
            risk_score: record.output.risk_score,
            fraud_score: record.output.fraud_score.unwrap_or(0.0),
            timestamp: record.timestamp.clone(),
            agency: record.input.agency.clone(),
            is_anomaly: record.output.is_anomaly,
        }
    }
}

/// Aggregate statistics for a vendor, recomputed per query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorHistorySummary {
    pub total_transactions: usize,
    pub average_amount: f64,
    pub total_volume: f64,
    pub high_risk_count: usize,
    pub average_risk_score: f64,
    /// At most five, newest first
    pub recent_transactions: Vec<VendorTransaction>,
}

impl VendorHistorySummary {
    /// The "no history" answer
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_transactions == 0
    }
}
