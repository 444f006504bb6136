//! Scoring plus prediction capture behind one interface

use crate::config::AppConfig;
use crate::models::scoring::ScoringEngine;
use crate::store::{PredictionStore, SENTINEL_ID};
use crate::types::history::VendorHistorySummary;
use crate::types::prediction::{Assessment, PredictionRecord, ScoreOutput};
use crate::types::transaction::ProcurementTransaction;
use anyhow::Result;
use tracing::{info, warn};

/// Outcome of assessing one transaction
#[derive(Debug, Clone)]
pub struct AssessmentOutcome {
    /// What the caller is told
    pub assessment: Assessment,
    /// The persisted record, `None` when capture failed
    pub record: Option<PredictionRecord>,
}

impl AssessmentOutcome {
    pub fn is_persisted(&self) -> bool {
        self.record.is_some()
    }
}

/// Procurement risk service: scores transactions and keeps the audit trail
pub struct RiskService {
    engine: ScoringEngine,
    store: PredictionStore,
    history_limit: usize,
}

impl RiskService {
    pub fn new(engine: ScoringEngine, store: PredictionStore, history_limit: usize) -> Self {
        Self {
            engine,
            store,
            history_limit,
        }
    }

    /// Build the engine and open the store from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = ScoringEngine::from_config(config)?;
        let store = PredictionStore::open(&config.store.path);
        info!(store = %config.store.path, "Prediction store opened");
        Ok(Self::new(engine, store, config.store.history_limit))
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Default vendor history limit
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Score an amount without persisting anything
    pub fn score(&self, amount: f64) -> Result<ScoreOutput> {
        self.engine.score(amount)
    }

    /// Score a transaction and persist the result.
    ///
    /// Only a classifier failure is an error. If the record cannot be
    /// stored the score is still returned, under [`SENTINEL_ID`].
    pub fn assess(&self, tx: ProcurementTransaction) -> Result<AssessmentOutcome> {
        let output = self.engine.score(tx.amount)?;

        let outcome = match self.store.save(tx, output.clone()) {
            Ok(record) => AssessmentOutcome {
                assessment: Assessment {
                    prediction_id: record.prediction_id.clone(),
                    output,
                },
                record: Some(record),
            },
            Err(e) => {
                warn!(error = %e, "Prediction storage failed, returning sentinel id");
                AssessmentOutcome {
                    assessment: Assessment {
                        prediction_id: SENTINEL_ID.to_string(),
                        output,
                    },
                    record: None,
                }
            }
        };

        Ok(outcome)
    }

    /// Persist an already-scored transaction
    pub fn store(&self, input: ProcurementTransaction, output: ScoreOutput) -> String {
        self.store.store(input, output)
    }

    /// Look up a stored prediction
    pub fn load(&self, prediction_id: &str) -> Option<PredictionRecord> {
        self.store.load(prediction_id)
    }

    /// Vendor history, `limit` defaulting to the configured value
    pub fn vendor_history(&self, vendor: &str, limit: Option<usize>) -> VendorHistorySummary {
        self.store
            .vendor_history(vendor, limit.unwrap_or(self.history_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::SigmaClassifier;
    use crate::models::stats::AmountStatistics;
    use std::fs;
    use tempfile::TempDir;

    fn service(path: &std::path::Path) -> RiskService {
        let stats = AmountStatistics::new(100_000.0, 50_000.0);
        let engine = ScoringEngine::new(Box::new(SigmaClassifier::new(stats, 3.0)), stats);
        RiskService::new(engine, PredictionStore::open(path), 100)
    }

    #[test]
    fn test_assess_persists_record() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir.path().join("predictions.jsonl"));

        let outcome = service
            .assess(ProcurementTransaction::new(9_000_000.0, "MINDEF", "Acme"))
            .unwrap();

        assert!(outcome.is_persisted());
        assert!(outcome.assessment.output.is_anomaly);
        let loaded = service.load(&outcome.assessment.prediction_id).unwrap();
        assert_eq!(Some(loaded), outcome.record);
    }

    #[test]
    fn test_assess_survives_store_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("predictions.jsonl");
        fs::create_dir(&path).unwrap();
        let service = service(&path);

        let outcome = service
            .assess(ProcurementTransaction::new(120_000.0, "MINDEF", "Acme"))
            .unwrap();

        assert!(!outcome.is_persisted());
        assert_eq!(outcome.assessment.prediction_id, SENTINEL_ID);
        assert!(!outcome.assessment.output.is_anomaly);
    }

    #[test]
    fn test_vendor_history_default_limit() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir.path().join("predictions.jsonl"));

        for amount in [90_000.0, 110_000.0] {
            service
                .assess(ProcurementTransaction::new(amount, "NEA", "Acme"))
                .unwrap();
        }

        assert_eq!(service.vendor_history("ACME", None).total_transactions, 2);
        assert_eq!(service.vendor_history("acme", Some(1)).total_transactions, 1);
    }
}
