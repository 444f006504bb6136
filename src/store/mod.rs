//! Persisted prediction log and its read-side queries

pub mod aggregator;
pub mod codec;
pub mod id;
pub mod log;

pub use aggregator::{VendorAggregator, DEFAULT_HISTORY_LIMIT, HIGH_RISK_SCORE};
pub use id::{IdGenerator, SENTINEL_ID};
pub use self::log::{AppendOnlyLog, Scan, ScanFault};

use crate::types::history::VendorHistorySummary;
use crate::types::prediction::{PredictionRecord, ScoreOutput};
use crate::types::transaction::ProcurementTransaction;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Failures at the store boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing file could not be opened, read or written
    #[error("prediction store unavailable at {}: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Record could not be serialized
    #[error("failed to encode prediction record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Encoded record is longer than the log accepts
    #[error("prediction record of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    /// No identifier could be issued for the record
    #[error("system clock is outside the representable range")]
    Clock,
}

/// Prediction capture, lookup and vendor history over an [`AppendOnlyLog`].
///
/// Lookups are linear scans; an index rebuilt from the log would slot in
/// here without changing callers.
pub struct PredictionStore {
    log: AppendOnlyLog,
    ids: IdGenerator,
}

impl PredictionStore {
    /// Open the store at `path` (created on first write)
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            log: AppendOnlyLog::new(path),
            ids: IdGenerator::new(),
        }
    }

    /// Underlying log
    pub fn log(&self) -> &AppendOnlyLog {
        &self.log
    }

    /// Persist a scored transaction and return its new identifier
    pub fn save(
        &self,
        input: ProcurementTransaction,
        output: ScoreOutput,
    ) -> Result<PredictionRecord, StoreError> {
        let stamp = self.ids.next_stamp().ok_or(StoreError::Clock)?;
        let record = PredictionRecord::new(stamp.id, stamp.at, input, output);
        self.log.append(&record)?;

        debug!(prediction_id = %record.prediction_id, "Prediction stored");
        Ok(record)
    }

    /// Persist a scored transaction, degrading to [`SENTINEL_ID`] on failure
    pub fn store(&self, input: ProcurementTransaction, output: ScoreOutput) -> String {
        match self.save(input, output) {
            Ok(record) => record.prediction_id,
            Err(e) => {
                warn!(error = %e, "Prediction storage failed");
                SENTINEL_ID.to_string()
            }
        }
    }

    /// Find a record by identifier, `Err` only when the log cannot be read
    pub fn find(&self, prediction_id: &str) -> Result<Option<PredictionRecord>, StoreError> {
        for item in self.log.scan()? {
            match item {
                Ok(record) if record.prediction_id == prediction_id => return Ok(Some(record)),
                Ok(_) => {}
                Err(ScanFault::Decode { line, source }) => {
                    debug!(line, error = %source, "Skipping undecodable prediction");
                }
                Err(ScanFault::Io(source)) => {
                    return Err(StoreError::Unavailable {
                        path: self.log.path().to_path_buf(),
                        source,
                    });
                }
            }
        }
        Ok(None)
    }

    /// Load a record by identifier; read failures look like "not found"
    pub fn load(&self, prediction_id: &str) -> Option<PredictionRecord> {
        self.find(prediction_id).unwrap_or_else(|e| {
            warn!(prediction_id = %prediction_id, error = %e, "Prediction load failed");
            None
        })
    }

    /// Summarize a vendor's history, `Err` only when the log cannot be read
    pub fn try_vendor_history(
        &self,
        vendor: &str,
        limit: usize,
    ) -> Result<VendorHistorySummary, StoreError> {
        let mut aggregator = VendorAggregator::new(vendor, limit);
        for item in self.log.scan()? {
            match item {
                Ok(record) => aggregator.observe(record),
                Err(ScanFault::Decode { line, source }) => {
                    debug!(line, error = %source, "Skipping undecodable prediction");
                }
                Err(ScanFault::Io(source)) => {
                    return Err(StoreError::Unavailable {
                        path: self.log.path().to_path_buf(),
                        source,
                    });
                }
            }
        }
        Ok(aggregator.finish())
    }

    /// Summarize a vendor's history; read failures yield the zero summary
    pub fn vendor_history(&self, vendor: &str, limit: usize) -> VendorHistorySummary {
        self.try_vendor_history(vendor, limit).unwrap_or_else(|e| {
            warn!(vendor = %vendor, error = %e, "Vendor history query failed");
            VendorHistorySummary::empty()
        })
    }
}
