//! Type definitions for procurement risk scoring

pub mod history;
pub mod prediction;
pub mod transaction;

pub use history::{VendorHistorySummary, VendorTransaction};
pub use prediction::{Assessment, PredictionRecord, ScoreOutput};
pub use transaction::ProcurementTransaction;
