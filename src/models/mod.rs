//! Anomaly classification and scoring components

pub mod classifier;
pub mod loader;
pub mod scoring;
pub mod stats;

pub use classifier::{OutlierClassifier, SigmaClassifier, Verdict};
pub use loader::{IsolationForestModel, ModelLoader};
pub use scoring::ScoringEngine;
pub use stats::AmountStatistics;
