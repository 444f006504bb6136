//! Request metrics for the procurement risk service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples retained for percentile calculation
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector for the service
pub struct ServiceMetrics {
    /// Transactions scored
    pub transactions_scored: AtomicU64,
    /// Transactions flagged as anomalous
    pub anomalies_flagged: AtomicU64,
    /// Assessments answered with the sentinel id
    pub store_failures: AtomicU64,
    /// Lookups that found a record
    pub lookup_hits: AtomicU64,
    /// Lookups that found nothing
    pub lookup_misses: AtomicU64,
    /// Vendor history queries served
    pub history_queries: AtomicU64,
    /// Requests rejected as malformed or failed
    pub request_errors: AtomicU64,
    /// Scoring latencies (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution, ten buckets over 0-100
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            transactions_scored: AtomicU64::new(0),
            anomalies_flagged: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            lookup_hits: AtomicU64::new(0),
            lookup_misses: AtomicU64::new(0),
            history_queries: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored transaction
    pub fn record_assessment(
        &self,
        processing_time: Duration,
        risk_score: u8,
        is_anomaly: bool,
        persisted: bool,
    ) {
        self.transactions_scored.fetch_add(1, Ordering::Relaxed);
        if is_anomaly {
            self.anomalies_flagged.fetch_add(1, Ordering::Relaxed);
        }
        if !persisted {
            self.store_failures.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }

        let bucket = (usize::from(risk_score) / 10).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a lookup by prediction id
    pub fn record_lookup(&self, found: bool) {
        if found {
            self.lookup_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lookup_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a vendor history query
    pub fn record_history_query(&self) {
        self.history_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that could not be served
    pub fn record_error(&self) {
        self.request_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => {
                let mut sorted = times.clone();
                sorted.sort_unstable();
                sorted
            }
            _ => return ProcessingStats::default(),
        };

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let anomalies = self.anomalies_flagged.load(Ordering::Relaxed);
        let anomaly_rate = if scored > 0 {
            (anomalies as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          PROCUREMENT RISK SERVICE - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored: {:>8}  │  Throughput: {:>6.1} tx/s    ║",
            scored,
            self.get_throughput()
        );
        info!(
            "║ Anomalies Flagged:   {:>8}  │  Anomaly Rate: {:>6.1}%     ║",
            anomalies, anomaly_rate
        );
        info!(
            "║ Store Failures: {:>6}  Lookups: {:>6} hit / {:>6} miss      ║",
            self.store_failures.load(Ordering::Relaxed),
            self.lookup_hits.load(Ordering::Relaxed),
            self.lookup_misses.load(Ordering::Relaxed)
        );
        info!(
            "║ History Queries: {:>6}  Request Errors: {:>6}               ║",
            self.history_queries.load(Ordering::Relaxed),
            self.request_errors.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:>3}-{:<3}: {:>6} ({:>5.1}%) {}",
                i * 10,
                i * 10 + 9,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics summary logger
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
