//! Scoring output and the persisted prediction record

use crate::types::transaction::ProcurementTransaction;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound of the risk scale
pub const MAX_RISK_SCORE: u8 = 100;

/// Result of scoring a single transaction amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutput {
    /// Risk score (0 - 100)
    pub risk_score: u8,

    /// Whether the classifier marked the amount as an outlier
    pub is_anomaly: bool,

    /// Optional supplementary fraud score from downstream analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_score: Option<f64>,

    /// Human-readable reasons, empty unless anomalous
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl ScoreOutput {
    /// Whether this score counts towards a vendor's high-risk tally
    pub fn is_high_risk(&self) -> bool {
        self.risk_score >= crate::store::aggregator::HIGH_RISK_SCORE
    }
}

/// Record content that breaks the prediction data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordViolation {
    #[error("risk score {0} is above {MAX_RISK_SCORE}")]
    RiskScoreOutOfRange(u8),

    #[error("amount is negative or not finite")]
    InvalidAmount,

    #[error("reasons must be present exactly when the score is anomalous")]
    ReasonsMismatch,
}

/// One persisted (transaction, score) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Unique, time-ordered identifier (`PRED-<UTC micros>`)
    pub prediction_id: String,

    /// ISO-8601 UTC creation time
    pub timestamp: String,

    /// Transaction as submitted
    pub input: ProcurementTransaction,

    /// Scoring result
    pub output: ScoreOutput,
}

impl PredictionRecord {
    /// Create a record stamped at `created_at`
    pub fn new(
        prediction_id: String,
        created_at: DateTime<Utc>,
        input: ProcurementTransaction,
        output: ScoreOutput,
    ) -> Self {
        Self {
            prediction_id,
            timestamp: format_timestamp(created_at),
            input,
            output,
        }
    }

    /// Check the invariants every stored record must satisfy
    pub fn validate(&self) -> Result<(), RecordViolation> {
        if self.output.risk_score > MAX_RISK_SCORE {
            return Err(RecordViolation::RiskScoreOutOfRange(self.output.risk_score));
        }
        if !self.input.amount.is_finite() || self.input.amount < 0.0 {
            return Err(RecordViolation::InvalidAmount);
        }
        if self.output.reasons.is_empty() == self.output.is_anomaly {
            return Err(RecordViolation::ReasonsMismatch);
        }
        Ok(())
    }
}

/// Fixed-width ISO-8601 form, so lexical order equals time order
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reply to a scoring request: the assigned id plus the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub prediction_id: String,

    #[serde(flatten)]
    pub output: ScoreOutput,
}
