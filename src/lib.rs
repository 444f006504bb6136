//! Procurement Risk Library
//!
//! Scores procurement awards for anomaly risk and keeps every scored
//! transaction in a durable, append-only prediction log that can be queried
//! by prediction id or summarized per vendor.

pub mod config;
pub mod consumer;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod service;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use models::scoring::ScoringEngine;
pub use producer::ReplyProducer;
pub use service::RiskService;
pub use store::PredictionStore;
pub use types::{
    prediction::{Assessment, PredictionRecord, ScoreOutput},
    transaction::ProcurementTransaction,
};
