//! Anomaly scoring for procurement amounts

use crate::config::AppConfig;
use crate::models::classifier::{OutlierClassifier, SigmaClassifier, Verdict};
use crate::models::loader::ModelLoader;
use crate::models::stats::AmountStatistics;
use crate::types::prediction::ScoreOutput;
use anyhow::Result;
use rand::Rng;
use std::path::Path;
use tracing::{debug, info, warn};

/// Reason attached to every anomalous amount
pub const ANOMALY_PATTERN_REASON: &str =
    "Amount matches anomaly pattern in historic procurement data";

/// Additional reason for anomalous amounts above `mean + 2σ`
pub const TWO_SIGMA_REASON: &str = "Transaction amount > 2 Sigma from mean";

/// Anomalous scores fall in `[85, 98]`
pub const ANOMALY_BASE_SCORE: u8 = 85;
pub const ANOMALY_JITTER: u8 = 14;

/// Normal scores fall in `[10, 29]`
pub const NORMAL_BASE_SCORE: u8 = 10;
pub const NORMAL_JITTER: u8 = 20;

/// Turn a classifier verdict into a score.
///
/// The numeric score carries bounded random jitter inside its band; the
/// band and the reasons depend only on the verdict and the statistics.
pub fn score_verdict<R: Rng>(
    verdict: Verdict,
    amount: f64,
    stats: &AmountStatistics,
    rng: &mut R,
) -> ScoreOutput {
    match verdict {
        Verdict::Outlier => {
            let mut reasons = vec![ANOMALY_PATTERN_REASON.to_string()];
            if amount > stats.two_sigma_ceiling() {
                reasons.push(TWO_SIGMA_REASON.to_string());
            }
            ScoreOutput {
                risk_score: ANOMALY_BASE_SCORE + rng.gen_range(0..ANOMALY_JITTER),
                is_anomaly: true,
                fraud_score: None,
                reasons,
            }
        }
        Verdict::Inlier => ScoreOutput {
            risk_score: NORMAL_BASE_SCORE + rng.gen_range(0..NORMAL_JITTER),
            is_anomaly: false,
            fraud_score: None,
            reasons: Vec::new(),
        },
    }
}

/// Classify `amount` and score the verdict
pub fn score<R: Rng>(
    amount: f64,
    classifier: &dyn OutlierClassifier,
    stats: &AmountStatistics,
    rng: &mut R,
) -> Result<ScoreOutput> {
    let verdict = classifier.classify(amount)?;
    Ok(score_verdict(verdict, amount, stats, rng))
}

/// Immutable scoring context: a fitted classifier plus the amount
/// statistics it was fitted on. Built once at startup and shared.
pub struct ScoringEngine {
    classifier: Box<dyn OutlierClassifier>,
    stats: AmountStatistics,
}

impl ScoringEngine {
    pub fn new(classifier: Box<dyn OutlierClassifier>, stats: AmountStatistics) -> Self {
        Self { classifier, stats }
    }

    /// Build the engine from configuration.
    ///
    /// Statistics come from the training corpus, or the built-in fallback
    /// sample when it cannot be read. The ONNX isolation forest is used when
    /// its file exists and loads; otherwise amounts are judged by distance
    /// from the mean.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let training = &config.training;
        let stats = match AmountStatistics::from_csv(&training.csv_path, &training.amount_column) {
            Ok(stats) => {
                info!(
                    corpus = %training.csv_path,
                    mean = stats.mean,
                    std = stats.standard_deviation,
                    "Amount statistics loaded"
                );
                stats
            }
            Err(e) => {
                let stats = AmountStatistics::fallback();
                warn!(
                    corpus = %training.csv_path,
                    error = %e,
                    mean = stats.mean,
                    std = stats.standard_deviation,
                    "Training corpus unavailable, using fallback statistics"
                );
                stats
            }
        };

        let model_path = Path::new(&config.models.models_dir).join(&config.models.isolation_forest);
        let classifier: Box<dyn OutlierClassifier> = if model_path.exists() {
            match ModelLoader::with_threads(config.models.onnx_threads)
                .and_then(|loader| loader.load_isolation_forest(&model_path, "isolation_forest"))
            {
                Ok(model) => Box::new(model),
                Err(e) => {
                    warn!(path = %model_path.display(), error = %e, "Failed to load model, using sigma fallback");
                    Box::new(SigmaClassifier::new(stats, config.models.fallback_sigma))
                }
            }
        } else {
            warn!(path = %model_path.display(), "Model file not found, using sigma fallback");
            Box::new(SigmaClassifier::new(stats, config.models.fallback_sigma))
        };

        info!(classifier = classifier.name(), "Scoring engine initialized");
        Ok(Self::new(classifier, stats))
    }

    pub fn stats(&self) -> &AmountStatistics {
        &self.stats
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Score an amount using the thread-local RNG for jitter
    pub fn score(&self, amount: f64) -> Result<ScoreOutput> {
        self.score_with_rng(amount, &mut rand::thread_rng())
    }

    /// Score an amount with a caller-supplied RNG
    pub fn score_with_rng<R: Rng>(&self, amount: f64, rng: &mut R) -> Result<ScoreOutput> {
        let output = score(amount, self.classifier.as_ref(), &self.stats, rng)?;
        debug!(
            classifier = self.classifier.name(),
            amount = amount,
            risk_score = output.risk_score,
            is_anomaly = output.is_anomaly,
            "Amount scored"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Outlier above a fixed cut-off
    struct CutoffClassifier(f64);

    impl OutlierClassifier for CutoffClassifier {
        fn name(&self) -> &str {
            "cutoff"
        }

        fn classify(&self, amount: f64) -> Result<Verdict> {
            Ok(if amount > self.0 {
                Verdict::Outlier
            } else {
                Verdict::Inlier
            })
        }
    }

    struct BrokenClassifier;

    impl OutlierClassifier for BrokenClassifier {
        fn name(&self) -> &str {
            "broken"
        }

        fn classify(&self, _amount: f64) -> Result<Verdict> {
            Err(anyhow!("session crashed"))
        }
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(
            Box::new(CutoffClassifier(2_000_000.0)),
            AmountStatistics::new(1_000_000.0, 100_000.0),
        )
    }

    #[test]
    fn test_score_bands() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let normal = engine.score_with_rng(50_000.0, &mut rng).unwrap();
            assert!((10..=29).contains(&normal.risk_score));
            assert!(!normal.is_anomaly);
            assert!(normal.reasons.is_empty());

            let anomalous = engine.score_with_rng(5_000_000.0, &mut rng).unwrap();
            assert!((85..=98).contains(&anomalous.risk_score));
            assert!(anomalous.is_anomaly);
            assert!(!anomalous.reasons.is_empty());
        }
    }

    #[test]
    fn test_two_sigma_reason_is_additive() {
        let output = engine().score(5_000_000.0).unwrap();

        assert_eq!(
            output.reasons,
            vec![ANOMALY_PATTERN_REASON.to_string(), TWO_SIGMA_REASON.to_string()]
        );
    }

    #[test]
    fn test_outlier_below_two_sigma_has_single_reason() {
        let engine = ScoringEngine::new(
            Box::new(CutoffClassifier(0.0)),
            AmountStatistics::new(1_000_000.0, 100_000.0),
        );

        let output = engine.score(1_100_000.0).unwrap();
        assert!(output.is_anomaly);
        assert_eq!(output.reasons, vec![ANOMALY_PATTERN_REASON.to_string()]);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let engine = engine();
        let verdicts: Vec<bool> = (0..50)
            .map(|_| engine.score(2_500_000.0).unwrap().is_anomaly)
            .collect();
        assert!(verdicts.iter().all(|&v| v));
    }

    #[test]
    fn test_bands_cover_jitter_range() {
        let stats = AmountStatistics::new(0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen_low = std::collections::HashSet::new();
        let mut seen_high = std::collections::HashSet::new();

        for _ in 0..5000 {
            seen_low.insert(score_verdict(Verdict::Inlier, 1.0, &stats, &mut rng).risk_score);
            seen_high.insert(score_verdict(Verdict::Outlier, 1.0, &stats, &mut rng).risk_score);
        }

        assert_eq!(seen_low.len(), 20);
        assert_eq!(seen_high.len(), 14);
        assert_eq!(seen_low.iter().max(), Some(&29));
        assert_eq!(seen_high.iter().min(), Some(&85));
        assert_eq!(seen_high.iter().max(), Some(&98));
    }

    #[test]
    fn test_classifier_failure_propagates() {
        let engine = ScoringEngine::new(Box::new(BrokenClassifier), AmountStatistics::new(0.0, 0.0));
        assert!(engine.score(100.0).is_err());
    }
}
