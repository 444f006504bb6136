//! Procurement transaction submitted for scoring

use serde::{Deserialize, Serialize};

/// A government procurement award to be assessed for anomaly risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementTransaction {
    /// Awarded amount (non-negative)
    pub amount: f64,

    /// Awarding agency
    pub agency: String,

    /// Supplier receiving the award
    #[serde(alias = "supplier_name")]
    pub vendor: String,
}

impl ProcurementTransaction {
    /// Create a new transaction
    pub fn new(amount: f64, agency: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            amount,
            agency: agency.into(),
            vendor: vendor.into(),
        }
    }

    /// Case-insensitive vendor comparison used by history queries
    pub fn is_vendor(&self, vendor: &str) -> bool {
        self.vendor.to_lowercase() == vendor.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_deserialization() {
        let tx: ProcurementTransaction = serde_json::from_str(
            r#"{"amount": 150000.0, "agency": "Ministry of Health", "vendor": "Acme Corp"}"#,
        )
        .unwrap();

        assert_eq!(tx.amount, 150000.0);
        assert_eq!(tx.agency, "Ministry of Health");
        assert_eq!(tx.vendor, "Acme Corp");
    }

    #[test]
    fn test_supplier_name_alias() {
        let tx: ProcurementTransaction = serde_json::from_str(
            r#"{"amount": 1.0, "agency": "LTA", "supplier_name": "Global Tech"}"#,
        )
        .unwrap();
        assert_eq!(tx.vendor, "Global Tech");
    }

    #[test]
    fn test_vendor_match_ignores_case() {
        let tx = ProcurementTransaction::new(10.0, "LTA", "Acme Corp");
        assert!(tx.is_vendor("acme corp"));
        assert!(tx.is_vendor("ACME CORP"));
        assert!(!tx.is_vendor("acme"));
    }
}
