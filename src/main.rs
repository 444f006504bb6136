//! Procurement Risk Service - Main Entry Point
//!
//! Answers scoring, lookup and vendor history requests over NATS, persisting
//! every scored transaction to the prediction log.

use anyhow::{Context, Result};
use async_nats::Message;
use futures::StreamExt;
use procurement_risk::{
    config::AppConfig,
    consumer::{HistoryRequest, LookupRequest, Request, RequestConsumer, RequestKind},
    metrics::{MetricsReporter, ServiceMetrics},
    producer::ReplyProducer,
    service::RiskService,
    types::transaction::ProcurementTransaction,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (optional path as first argument)
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(&path)?,
        None => AppConfig::load()?,
    };

    // Initialize logging
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("procurement_risk={}", config.logging.level).parse()?);
    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Procurement Risk Service");

    let metrics = Arc::new(ServiceMetrics::new());

    // Scoring context and prediction store are built once and shared read-only
    let service = Arc::new(RiskService::from_config(&config)?);
    let stats = service.engine().stats();
    info!(
        classifier = service.engine().classifier_name(),
        mean = stats.mean,
        std = stats.standard_deviation,
        two_sigma = stats.two_sigma_ceiling(),
        "Risk service initialized"
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats);
    let producer = ReplyProducer::new(client.clone(), &config.nats.alert_subject);

    let num_workers = config.pipeline.workers.max(1);
    info!(
        "Starting request loop with {} parallel workers on {:?}",
        num_workers,
        consumer.subjects().collect::<Vec<_>>()
    );
    info!("Publishing anomaly alerts to: {}", producer.alert_subject());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let metrics_clone = metrics.clone();
    let interval = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        MetricsReporter::new(metrics_clone, interval).start().await;
    });

    let mut requests = consumer.subscribe().await?;

    while let Some(request) = requests.next().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        let service = service.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            handle_request(request, &service, &producer, &metrics).await;

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} tx/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

async fn handle_request(
    request: Request,
    service: &Arc<RiskService>,
    producer: &ReplyProducer,
    metrics: &ServiceMetrics,
) {
    let message = &request.message;
    let result = match request.kind {
        RequestKind::Score => handle_score(message, service, producer, metrics).await,
        RequestKind::Lookup => handle_lookup(message, service, producer, metrics).await,
        RequestKind::History => handle_history(message, service, producer, metrics).await,
    };

    if let Err(e) = result {
        metrics.record_error();
        warn!(subject = %message.subject, kind = ?request.kind, error = %e, "Request failed");
        if let Err(e) = producer.reply_error(message, &format!("{:#}", e)).await {
            error!(error = %e, "Failed to send error reply");
        }
    }
}

async fn handle_score(
    message: &Message,
    service: &Arc<RiskService>,
    producer: &ReplyProducer,
    metrics: &ServiceMetrics,
) -> Result<()> {
    let start_time = Instant::now();
    let tx: ProcurementTransaction =
        serde_json::from_slice(&message.payload).context("Malformed transaction payload")?;

    let svc = service.clone();
    let outcome = tokio::task::spawn_blocking(move || svc.assess(tx)).await??;
    let processing_time = start_time.elapsed();

    let assessment = &outcome.assessment;
    metrics.record_assessment(
        processing_time,
        assessment.output.risk_score,
        assessment.output.is_anomaly,
        outcome.is_persisted(),
    );

    producer.reply(message, assessment).await?;

    match outcome.record.as_ref().filter(|r| r.output.is_anomaly) {
        Some(record) => {
            if let Err(e) = producer.publish_alert(record).await {
                error!(
                    prediction_id = %record.prediction_id,
                    error = %e,
                    "Failed to publish anomaly alert"
                );
            } else {
                info!(
                    prediction_id = %record.prediction_id,
                    vendor = %record.input.vendor,
                    amount = record.input.amount,
                    risk_score = record.output.risk_score,
                    reasons = ?record.output.reasons,
                    processing_time_us = processing_time.as_micros(),
                    "Anomaly alert published"
                );
            }
        }
        None => {
            debug!(
                prediction_id = %assessment.prediction_id,
                risk_score = assessment.output.risk_score,
                is_anomaly = assessment.output.is_anomaly,
                processing_time_us = processing_time.as_micros(),
                "Transaction scored"
            );
        }
    }

    Ok(())
}

async fn handle_lookup(
    message: &Message,
    service: &Arc<RiskService>,
    producer: &ReplyProducer,
    metrics: &ServiceMetrics,
) -> Result<()> {
    let req: LookupRequest =
        serde_json::from_slice(&message.payload).context("Malformed lookup payload")?;

    let svc = service.clone();
    let id = req.prediction_id.clone();
    let record = tokio::task::spawn_blocking(move || svc.load(&id)).await?;

    metrics.record_lookup(record.is_some());
    debug!(prediction_id = %req.prediction_id, found = record.is_some(), "Prediction lookup");

    producer.reply(message, &record).await
}

async fn handle_history(
    message: &Message,
    service: &Arc<RiskService>,
    producer: &ReplyProducer,
    metrics: &ServiceMetrics,
) -> Result<()> {
    let req: HistoryRequest =
        serde_json::from_slice(&message.payload).context("Malformed history payload")?;

    let svc = service.clone();
    let vendor = req.vendor.clone();
    let summary = tokio::task::spawn_blocking(move || svc.vendor_history(&vendor, req.limit)).await?;

    metrics.record_history_query();
    debug!(
        vendor = %req.vendor,
        total_transactions = summary.total_transactions,
        high_risk_count = summary.high_risk_count,
        "Vendor history served"
    );

    producer.reply(message, &summary).await
}
