//! Performance metrics and statistics tracking for the prediction service.

use crate::error::ErrorKind;
use crate::types::prediction::PredictionSet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for service performance
pub struct PipelineMetrics {
    /// Total requests answered with predictions
    pub requests_succeeded: AtomicU64,
    /// Requests rejected as bad input
    pub bad_input_errors: AtomicU64,
    /// Requests rejected because the service was not ready
    pub unavailable_errors: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Confidence distribution buckets, all models
    confidence_buckets: RwLock<[u64; 10]>,
    /// Predicted label counts per model
    label_counts: RwLock<HashMap<String, HashMap<String, u64>>>,
    /// Multi-model responses, and how many of them were unanimous
    multi_model_responses: AtomicU64,
    unanimous_responses: AtomicU64,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests_succeeded: AtomicU64::new(0),
            bad_input_errors: AtomicU64::new(0),
            unavailable_errors: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            label_counts: RwLock::new(HashMap::new()),
            multi_model_responses: AtomicU64::new(0),
            unanimous_responses: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, processing_time: Duration, predictions: &PredictionSet) {
        self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);

        if let Ok(mut buckets) = self.confidence_buckets.write() {
            for (_, prediction) in predictions.iter() {
                let bucket = (prediction.confidence * 10.0).clamp(0.0, 9.0) as usize;
                buckets[bucket] += 1;
            }
        }

        if let Ok(mut counts) = self.label_counts.write() {
            for (model, prediction) in predictions.iter() {
                *counts
                    .entry(model.clone())
                    .or_default()
                    .entry(prediction.label.clone())
                    .or_insert(0) += 1;
            }
        }

        if predictions.len() > 1 {
            self.multi_model_responses.fetch_add(1, Ordering::Relaxed);
            if predictions.unanimous() {
                self.unanimous_responses.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a rejected request
    pub fn record_error(&self, processing_time: Duration, kind: ErrorKind) {
        self.record_time(processing_time);
        match kind {
            ErrorKind::BadInput => self.bad_input_errors.fetch_add(1, Ordering::Relaxed),
            ErrorKind::Unavailable => self.unavailable_errors.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Total requests handled, successful or not
    pub fn total_requests(&self) -> u64 {
        self.requests_succeeded.load(Ordering::Relaxed)
            + self.bad_input_errors.load(Ordering::Relaxed)
            + self.unavailable_errors.load(Ordering::Relaxed)
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Fraction of multi-model responses in which every model agreed
    pub fn get_agreement_rate(&self) -> f64 {
        let total = self.multi_model_responses.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.unanimous_responses.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_requests() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get confidence distribution
    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; 10])
    }

    /// Most frequent labels per model, highest count first
    pub fn get_top_labels(&self, limit: usize) -> HashMap<String, Vec<(String, u64)>> {
        let counts = match self.label_counts.read() {
            Ok(counts) => counts,
            Err(_) => return HashMap::new(),
        };

        counts
            .iter()
            .map(|(model, labels)| {
                let mut ranked: Vec<(String, u64)> =
                    labels.iter().map(|(l, c)| (l.clone(), *c)).collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                ranked.truncate(limit);
                (model.clone(), ranked)
            })
            .collect()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let total = self.total_requests();
        let succeeded = self.requests_succeeded.load(Ordering::Relaxed);
        let bad_input = self.bad_input_errors.load(Ordering::Relaxed);
        let unavailable = self.unavailable_errors.load(Ordering::Relaxed);
        let success_rate = if total > 0 {
            (succeeded as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let agreement = self.get_agreement_rate();
        let confidence = self.get_confidence_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          SYMPTOM PREDICTION SERVICE - METRICS SUMMARY        ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Handled:   {:>8}  │  Throughput: {:>6.1} req/s    ║",
            total, throughput
        );
        info!(
            "║ Succeeded:          {:>8}  │  Success Rate: {:>6.1}%      ║",
            succeeded, success_rate
        );
        info!(
            "║ Bad Input:          {:>8}  │  Unavailable: {:>8}       ║",
            bad_input, unavailable
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!(
            "║ Model Agreement: {:>5.1}% (all models predicted the same label) ║",
            agreement * 100.0
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Confidence Distribution:                                     ║");
        let buckets_total: u64 = confidence.iter().sum();
        for (i, &count) in confidence.iter().enumerate() {
            let pct = if buckets_total > 0 {
                (count as f64 / buckets_total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        let top_labels = self.get_top_labels(3);
        if !top_labels.is_empty() {
            info!("Top Predicted Labels:");
            for (model, labels) in &top_labels {
                info!("  {}: {:?}", model, labels);
            }
        }
    }
}

impl Default for PipelineMetrics {
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

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::ModelPrediction;

    fn predictions(ensemble_label: &str) -> PredictionSet {
        let mut set = PredictionSet::new();
        set.insert("logistic", ModelPrediction::new("Influenza", 0.85));
        set.insert("ensemble", ModelPrediction::new(ensemble_label, 0.42));
        set
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), &predictions("Influenza"));
        metrics.record_prediction(Duration::from_micros(200), &predictions("Common Cold"));
        metrics.record_error(Duration::from_micros(50), ErrorKind::BadInput);

        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.requests_succeeded.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.bad_input_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_processing_stats().count, 3);

        let buckets = metrics.get_confidence_distribution();
        assert_eq!(buckets[8], 2);
        assert_eq!(buckets[4], 2);
    }

    #[test]
    fn test_model_agreement() {
        let metrics = PipelineMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), &predictions("Influenza"));
        metrics.record_prediction(Duration::from_micros(100), &predictions("Influenza"));
        metrics.record_prediction(Duration::from_micros(100), &predictions("Migraine"));
        metrics.record_prediction(Duration::from_micros(100), &predictions("Migraine"));

        assert!((metrics.get_agreement_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_top_labels() {
        let metrics = PipelineMetrics::new();
        metrics.record_prediction(Duration::from_micros(10), &predictions("Migraine"));
        metrics.record_prediction(Duration::from_micros(10), &predictions("Migraine"));
        metrics.record_prediction(Duration::from_micros(10), &predictions("Influenza"));

        let top = metrics.get_top_labels(1);
        assert_eq!(top["ensemble"], vec![("Migraine".to_string(), 2)]);
        assert_eq!(top["logistic"], vec![("Influenza".to_string(), 3)]);
    }

    #[test]
    fn test_full_confidence_bucket() {
        let metrics = PipelineMetrics::new();
        let mut set = PredictionSet::new();
        set.insert("logistic", ModelPrediction::new("Influenza", 1.0));
        metrics.record_prediction(Duration::from_micros(10), &set);
        assert_eq!(metrics.get_confidence_distribution()[9], 1);
    }
}
