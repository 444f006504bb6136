//! Historical award amount statistics

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Sample used when no training corpus can be read
pub const FALLBACK_AMOUNTS: [f64; 4] = [1000.0, 5000.0, 10000.0, 500000.0];

/// Mean and standard deviation of historical award amounts.
///
/// Established once at startup and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountStatistics {
    pub mean: f64,
    pub standard_deviation: f64,
}

impl AmountStatistics {
    pub fn new(mean: f64, standard_deviation: f64) -> Self {
        Self {
            mean,
            standard_deviation,
        }
    }

    /// Mean and sample standard deviation (n - 1), `None` for no amounts
    pub fn from_amounts(amounts: &[f64]) -> Option<Self> {
        if amounts.is_empty() {
            return None;
        }

        let n = amounts.len() as f64;
        let mean = amounts.iter().sum::<f64>() / n;
        let standard_deviation = if amounts.len() < 2 {
            0.0
        } else {
            let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        };

        Some(Self::new(mean, standard_deviation))
    }

    /// Statistics over the amount column of a procurement CSV
    pub fn from_csv<P: AsRef<Path>>(path: P, column: &str) -> Result<Self> {
        let path = path.as_ref();
        let amounts = load_amounts(path, column)?;
        Self::from_amounts(&amounts)
            .ok_or_else(|| anyhow!("No usable '{}' values in {}", column, path.display()))
    }

    /// Statistics over [`FALLBACK_AMOUNTS`]
    pub fn fallback() -> Self {
        Self::from_amounts(&FALLBACK_AMOUNTS).unwrap_or(Self::new(0.0, 0.0))
    }

    /// `mean + 2σ`
    pub fn two_sigma_ceiling(&self) -> f64 {
        self.mean + 2.0 * self.standard_deviation
    }
}

/// Parse an award amount, tolerating `$` and thousands separators
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(['$', ','], "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read every parseable amount from `column`
pub fn load_amounts<P: AsRef<Path>>(path: P, column: &str) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let col_idx = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| anyhow!("Column '{}' not found in {}", column, path.display()))?;

    let mut amounts = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read CSV record")?;
        if let Some(amount) = record.get(col_idx).and_then(parse_amount) {
            amounts.push(amount);
        }
    }

    Ok(amounts)
}
