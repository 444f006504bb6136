//! Outlier classifiers consumed by the scoring engine

use crate::models::stats::AmountStatistics;
use anyhow::Result;

/// Binary classifier decision for an amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Outlier,
    Inlier,
}

impl Verdict {
    /// Map an isolation-forest label (`-1` outlier, `1` inlier)
    pub fn from_label(label: i64) -> Self {
        if label == -1 {
            Verdict::Outlier
        } else {
            Verdict::Inlier
        }
    }

    pub fn is_outlier(self) -> bool {
        self == Verdict::Outlier
    }
}

/// A fitted detector deciding whether an amount is an outlier.
///
/// Implementations must be deterministic for a given amount.
pub trait OutlierClassifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn classify(&self, amount: f64) -> Result<Verdict>;
}

/// Marks amounts more than `threshold` standard deviations from the mean
#[derive(Debug, Clone)]
pub struct SigmaClassifier {
    stats: AmountStatistics,
    threshold: f64,
}

impl SigmaClassifier {
    pub fn new(stats: AmountStatistics, threshold: f64) -> Self {
        Self { stats, threshold }
    }
}

impl OutlierClassifier for SigmaClassifier {
    fn name(&self) -> &str {
        "sigma"
    }

    fn classify(&self, amount: f64) -> Result<Verdict> {
        let distance = (amount - self.stats.mean).abs();
        if distance > self.threshold * self.stats.standard_deviation {
            Ok(Verdict::Outlier)
        } else {
            Ok(Verdict::Inlier)
        }
    }
}
