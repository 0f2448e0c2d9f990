//! Runtime counters for the interactive prediction service.

use crate::models::ScoreAggregator;
use crate::types::{PatientPrediction, RiskTier};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the prediction service
pub struct ServiceMetrics {
    /// Requests answered with a prediction
    pub requests_scored: AtomicU64,
    /// Requests answered with an error body
    pub requests_failed: AtomicU64,
    /// Predictions per risk tier
    by_tier: RwLock<HashMap<RiskTier, u64>>,
    /// Failures per error kind
    errors_by_kind: RwLock<HashMap<String, u64>>,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Max-min spread of the per-model probabilities
    model_spreads: RwLock<Vec<f64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_scored: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            by_tier: RwLock::new(HashMap::new()),
            errors_by_kind: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            model_spreads: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, prediction: &PatientPrediction) {
        self.requests_scored.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);

        if let Ok(mut by_tier) = self.by_tier.write() {
            *by_tier.entry(prediction.risk_tier).or_insert(0) += 1;
        }

        if prediction.models.len() >= 2 {
            let spread = ScoreAggregator::spread(&prediction.model_probabilities());
            if let Ok(mut spreads) = self.model_spreads.write() {
                spreads.push(spread);
                if spreads.len() > MAX_SAMPLES {
                    spreads.drain(0..MAX_SAMPLES / 2);
                }
            }
        }
    }

    /// Record a request that produced an error response
    pub fn record_failure(&self, latency: Duration, kind: &str) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);

        if let Ok(mut errors) = self.errors_by_kind.write() {
            *errors.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_latency(&self, latency: Duration) {
        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_scored.load(Ordering::Relaxed) + self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    pub fn tier_counts(&self) -> HashMap<RiskTier, u64> {
        self.by_tier.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn error_counts(&self) -> HashMap<String, u64> {
        self.errors_by_kind.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// Mean spread between the most and least confident model
    pub fn mean_spread(&self) -> f64 {
        match self.model_spreads.read() {
            Ok(spreads) if !spreads.is_empty() => {
                spreads.iter().sum::<f64>() / spreads.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Requests per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_requests() as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let scored = self.requests_scored.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let latency = self.latency_stats();
        let tiers = self.tier_counts();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          READMISSION PREDICTION SERVICE - SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Scored: {:>8}  │  Throughput: {:>7.1} req/s      ║",
            scored,
            self.throughput()
        );
        info!("║ Requests Failed: {:>8}                                    ║", failed);
        info!(
            "║ Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}        ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!(
            "║ Mean Model Spread: {:>5.3}                                     ║",
            self.mean_spread()
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        for tier in [RiskTier::Low, RiskTier::Moderate, RiskTier::High] {
            let count = tiers.get(&tier).copied().unwrap_or(0);
            let pct = if scored > 0 {
                count as f64 / scored as f64 * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>6} ({:>5.1}%)                                ║", tier.as_str(), count, pct);
        }
        for (kind, count) in self.error_counts() {
            info!("║   error {:18}: {:>6}                            ║", kind, count);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request latency statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a summary every `interval_secs`
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
