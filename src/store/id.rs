//! Prediction identifier generation

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix shared by every prediction identifier
pub const ID_PREFIX: &str = "PRED-";

/// Identifier handed out when a prediction could not be captured
pub const SENTINEL_ID: &str = "PRED-UNKNOWN";

/// A freshly issued identifier and the instant it encodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub id: String,
    pub at: DateTime<Utc>,
}

/// Issues `PRED-YYYYMMDDHHMMSSffffff` identifiers.
///
/// Each identifier encodes a distinct microsecond: when the clock has not
/// advanced past the last issued value, the next microsecond is used
/// instead. Identifiers from one generator are therefore unique and strictly
/// increasing in both time and lexical order.
#[derive(Debug)]
pub struct IdGenerator {
    last_micros: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            last_micros: AtomicI64::new(i64::MIN),
        }
    }

    /// Issue the next stamp, `None` if the clock is outside chrono's range
    pub fn next_stamp(&self) -> Option<Stamp> {
        self.next_stamp_at(Utc::now())
    }

    /// Issue the next identifier, degrading to [`SENTINEL_ID`]
    pub fn next_id(&self) -> String {
        self.next_stamp()
            .map(|stamp| stamp.id)
            .unwrap_or_else(|| SENTINEL_ID.to_string())
    }

    fn next_stamp_at(&self, now: DateTime<Utc>) -> Option<Stamp> {
        let now = now.timestamp_micros();
        let mut last = self.last_micros.load(Ordering::Acquire);
        let issued = loop {
            let candidate = now.max(last.saturating_add(1));
            match self.last_micros.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break candidate,
                Err(actual) => last = actual,
            }
        };

        let at = DateTime::from_timestamp_micros(issued)?;
        Some(Stamp {
            id: format_id(at),
            at,
        })
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn format_id(at: DateTime<Utc>) -> String {
    format!("{}{}", ID_PREFIX, at.format("%Y%m%d%H%M%S%6f"))
}
