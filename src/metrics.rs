use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry::metrics::{Counter as OtelCounter, Histogram as OtelHistogram};

/// Metrics recorded by the pipeline. Includes lightweight atomics for tests
/// and OpenTelemetry handles for production.
#[derive(Clone)]
pub struct PipelineMetrics {
    pub items_extracted_total: Arc<AtomicU64>,
    pub duplicates_skipped_total: Arc<AtomicU64>,
    pub searches_total: Arc<AtomicU64>,
    pub results_total: Arc<AtomicU64>,
    pub searches_failed_total: Arc<AtomicU64>,
    latency_hist: Option<OtelHistogram<f64>>,
    extracted_counter: Option<OtelCounter<f64>>,
    duplicates_counter: Option<OtelCounter<f64>>,
    searches_counter: Option<OtelCounter<f64>>,
    results_counter: Option<OtelCounter<f64>>,
    failed_counter: Option<OtelCounter<f64>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        let meter = global::meter("lenscan");
        Self {
            items_extracted_total: Arc::new(AtomicU64::new(0)),
            duplicates_skipped_total: Arc::new(AtomicU64::new(0)),
            searches_total: Arc::new(AtomicU64::new(0)),
            results_total: Arc::new(AtomicU64::new(0)),
            searches_failed_total: Arc::new(AtomicU64::new(0)),
            latency_hist: Some(meter.f64_histogram("search_latency_ms").build()),
            extracted_counter: Some(meter.f64_counter("items_extracted_total").build()),
            duplicates_counter: Some(meter.f64_counter("duplicates_skipped_total").build()),
            searches_counter: Some(meter.f64_counter("searches_total").build()),
            results_counter: Some(meter.f64_counter("results_total").build()),
            failed_counter: Some(meter.f64_counter("searches_failed_total").build()),
        }
    }

    pub fn record_extracted(&self, count: u64) {
        self.items_extracted_total.fetch_add(count, Ordering::Relaxed);
        if let Some(counter) = &self.extracted_counter {
            counter.add(count as f64, &[]);
        }
    }

    pub fn record_duplicate(&self) {
        self.duplicates_skipped_total.fetch_add(1, Ordering::Relaxed);
        if let Some(counter) = &self.duplicates_counter {
            counter.add(1.0, &[]);
        }
    }

    pub fn record_search(&self) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
        if let Some(counter) = &self.searches_counter {
            counter.add(1.0, &[]);
        }
    }

    pub fn record_result(&self, latency: Duration) {
        self.results_total.fetch_add(1, Ordering::Relaxed);
        if let Some(counter) = &self.results_counter {
            counter.add(1.0, &[]);
        }
        if let Some(hist) = &self.latency_hist {
            hist.record(latency.as_secs_f64() * 1000.0, &[]);
        }
    }

    pub fn record_failure(&self) {
        self.searches_failed_total.fetch_add(1, Ordering::Relaxed);
        if let Some(counter) = &self.failed_counter {
            counter.add(1.0, &[]);
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
