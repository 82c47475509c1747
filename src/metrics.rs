//! Request statistics for the estimation service.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the estimation service
pub struct ServiceMetrics {
    /// Estimates produced
    pub estimates_produced: AtomicU64,
    /// Requests rejected by validation
    pub validation_failures: AtomicU64,
    /// Requests that failed inside a model
    pub model_failures: AtomicU64,
    /// Rejections by error kind
    rejections_by_kind: RwLock<BTreeMap<String, u64>>,
    /// Estimates by loss level
    estimates_by_level: RwLock<BTreeMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Spread between ensemble members, per estimate
    model_spreads: RwLock<Vec<f64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            estimates_produced: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            model_failures: AtomicU64::new(0),
            rejections_by_kind: RwLock::new(BTreeMap::new()),
            estimates_by_level: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            model_spreads: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a produced estimate
    pub fn record_estimate(&self, processing_time: Duration, loss_level: &str) {
        self.estimates_produced.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        if let Ok(mut by_level) = self.estimates_by_level.write() {
            *by_level.entry(loss_level.to_string()).or_insert(0) += 1;
        }
    }

    /// Record the spread between regressors for one estimate
    pub fn record_spread(&self, model_estimates: &BTreeMap<String, f64>) {
        if model_estimates.len() < 2 {
            return;
        }
        let spread = crate::models::EstimateAggregator::spread(model_estimates);
        if let Ok(mut spreads) = self.model_spreads.write() {
            spreads.push(spread);
            if spreads.len() > 1000 {
                spreads.drain(0..500);
            }
        }
    }

    /// Record a rejected request
    pub fn record_rejection(&self, processing_time: Duration, kind: &str, validation: bool) {
        if validation {
            self.validation_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.model_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.record_time(processing_time);

        if let Ok(mut by_kind) = self.rejections_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Mean spread between regressors
    pub fn get_avg_spread(&self) -> f64 {
        match self.model_spreads.read() {
            Ok(spreads) if !spreads.is_empty() => {
                spreads.iter().sum::<f64>() / spreads.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Requests handled per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let handled = self.estimates_produced.load(Ordering::Relaxed)
            + self.validation_failures.load(Ordering::Relaxed)
            + self.model_failures.load(Ordering::Relaxed);
        if elapsed > 0.0 {
            handled as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Point-in-time copy of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            estimates_produced: self.estimates_produced.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
            rejections_by_kind: self
                .rejections_by_kind
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
            estimates_by_level: self
                .estimates_by_level
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
            processing: self.get_processing_stats(),
            avg_model_spread: self.get_avg_spread(),
            throughput_per_sec: self.get_throughput(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let handled = snapshot.estimates_produced
            + snapshot.validation_failures
            + snapshot.model_failures;
        let rejection_rate = if handled > 0 {
            (snapshot.validation_failures + snapshot.model_failures) as f64 / handled as f64
                * 100.0
        } else {
            0.0
        };

        info!(
            estimates = snapshot.estimates_produced,
            validation_failures = snapshot.validation_failures,
            model_failures = snapshot.model_failures,
            rejection_rate = format!("{:.1}%", rejection_rate),
            throughput = format!("{:.2} req/s", snapshot.throughput_per_sec),
            "Estimator metrics summary"
        );
        info!(
            mean_us = snapshot.processing.mean_us,
            p50_us = snapshot.processing.p50_us,
            p95_us = snapshot.processing.p95_us,
            p99_us = snapshot.processing.p99_us,
            avg_model_spread = snapshot.avg_model_spread,
            "Processing time"
        );
        for (kind, count) in &snapshot.rejections_by_kind {
            info!(kind = %kind, count = count, "Rejections");
        }
        for (level, count) in &snapshot.estimates_by_level {
            info!(level = %level, count = count, "Estimates by loss level");
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable view of [`ServiceMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub estimates_produced: u64,
    pub validation_failures: u64,
    pub model_failures: u64,
    pub rejections_by_kind: BTreeMap<String, u64>,
    pub estimates_by_level: BTreeMap<String, u64>,
    pub processing: ProcessingStats,
    pub avg_model_spread: f64,
    pub throughput_per_sec: f64,
}

/// Logs a metrics summary at a fixed interval
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
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
