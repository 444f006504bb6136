//! Test Transaction Producer
//!
//! Sends synthetic procurement awards to the scoring subject and logs the
//! assessments returned by the service.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Transaction structure matching the service's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProcurementTransaction {
    amount: f64,
    agency: String,
    vendor: String,
}

/// Reply fields the producer reports on
#[derive(Debug, Deserialize)]
struct Assessment {
    prediction_id: String,
    risk_score: u8,
    is_anomaly: bool,
    #[serde(default)]
    reasons: Vec<String>,
}

const AGENCIES: &[&str] = &[
    "Building and Construction Authority",
    "Civil Aviation Authority of Singapore",
    "Agri-food and Veterinary Authority",
    "Land Transport Authority",
    "Ministry of Culture, Community and Youth - Ministry Headquarter",
    "Housing and Development Board",
];

const VENDORS: &[&str] = &[
    "Larsen & Toubro Infra",
    "Ganesh Contractors",
    "Global Tech",
    "Acme Corp",
    "Unknown Mega Corp",
];

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Award in the usual range of historical procurement
    fn generate_normal(&mut self) -> ProcurementTransaction {
        ProcurementTransaction {
            amount: (self.rng.gen_range(5_000.0..2_000_000.0_f64) * 100.0).round() / 100.0,
            agency: self.random_choice(AGENCIES).to_string(),
            vendor: self.random_choice(VENDORS).to_string(),
        }
    }

    /// Oversized award far outside the historical distribution
    fn generate_suspicious(&mut self) -> ProcurementTransaction {
        ProcurementTransaction {
            amount: self.rng.gen_range(50_000_000.0..500_000_000.0_f64).round(),
            agency: self.random_choice(AGENCIES).to_string(),
            vendor: self.random_choice(VENDORS).to_string(),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("procurement.score");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let anomaly_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        anomaly_rate = anomaly_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, anomaly_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to send {} transactions...", count);

    let mut flagged = 0;
    let mut unpersisted = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(anomaly_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_normal()
        };

        let payload = serde_json::to_vec(&transaction)?;
        let reply = client.request(subject.to_string(), payload.into()).await?;

        match serde_json::from_slice::<Assessment>(&reply.payload) {
            Ok(assessment) => {
                if assessment.is_anomaly {
                    flagged += 1;
                    info!(
                        prediction_id = %assessment.prediction_id,
                        vendor = %transaction.vendor,
                        amount = transaction.amount,
                        risk_score = assessment.risk_score,
                        reasons = ?assessment.reasons,
                        "Anomaly flagged"
                    );
                }
                if assessment.prediction_id == "PRED-UNKNOWN" {
                    unpersisted += 1;
                }
            }
            Err(_) => {
                warn!(reply = %String::from_utf8_lossy(&reply.payload), "Unexpected reply");
            }
        }

        if (i + 1) % 10 == 0 {
            info!("Sent {}/{} transactions ({} flagged)", i + 1, count, flagged);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} transactions ({} flagged, {} not persisted)",
        count, flagged, unpersisted
    );

    Ok(())
}

async fn run_dry_mode(count: u64, anomaly_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(anomaly_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_normal()
        };

        let json = serde_json::to_string_pretty(&transaction)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
