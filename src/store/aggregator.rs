//! Vendor history aggregation over the prediction log

use crate::types::history::{VendorHistorySummary, VendorTransaction};
use crate::types::prediction::PredictionRecord;
use std::collections::VecDeque;

/// Scores at or above this count as high risk
pub const HIGH_RISK_SCORE: u8 = 70;

/// Number of transactions returned in `recent_transactions`
pub const RECENT_TRANSACTIONS: usize = 5;

/// Default number of matching records aggregated per query
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Accumulates the records of one vendor while the log is scanned.
///
/// Only the latest `limit` matches (in append order) are retained, so a
/// long-lived vendor is summarized over a bounded trailing window.
pub struct VendorAggregator {
    vendor: String,
    limit: usize,
    window: VecDeque<PredictionRecord>,
}

impl VendorAggregator {
    /// Create an aggregator for `vendor` (matched case-insensitively)
    pub fn new(vendor: &str, limit: usize) -> Self {
        Self {
            vendor: vendor.to_string(),
            limit,
            window: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
        }
    }

    /// Offer a scanned record; records of other vendors are ignored
    pub fn observe(&mut self, record: PredictionRecord) {
        if self.limit == 0 || !record.input.is_vendor(&self.vendor) {
            return;
        }
        if self.window.len() == self.limit {
            self.window.pop_front();
        }
        self.window.push_back(record);
    }

    /// Compute the summary over the retained records
    pub fn finish(self) -> VendorHistorySummary {
        let total_transactions = self.window.len();
        if total_transactions == 0 {
            return VendorHistorySummary::empty();
        }

        let total_volume: f64 = self.window.iter().map(|r| r.input.amount).sum();
        let high_risk_count = self.window.iter().filter(|r| r.output.is_high_risk()).count();
        let risk_sum: f64 = self.window.iter().map(|r| f64::from(r.output.risk_score)).sum();

        let mut recent: Vec<VendorTransaction> =
            self.window.iter().map(VendorTransaction::from).collect();
        // Stable: equal timestamps keep scan order
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(RECENT_TRANSACTIONS);

        VendorHistorySummary {
            total_transactions,
            average_amount: total_volume / total_transactions as f64,
            total_volume,
            high_risk_count,
            average_risk_score: risk_sum / total_transactions as f64,
            recent_transactions: recent,
        }
    }
}

/// Summarize `records` for `vendor` in one pass
pub fn summarize<I>(vendor: &str, limit: usize, records: I) -> VendorHistorySummary
where
    I: IntoIterator<Item = PredictionRecord>,
{
    let mut aggregator = VendorAggregator::new(vendor, limit);
    for record in records {
        aggregator.observe(record);
    }
    aggregator.finish()
}
