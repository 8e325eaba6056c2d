//! Prometheus metrics collection
//!
//! Tracks generation requests by strategy and outcome, unified-to-
//! sequential fallbacks, cache effectiveness, and executor truncation
//! retries. Exposed via the `/metrics` endpoint in Prometheus text
//! format.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Generation strategy label for metrics
///
/// Restricting label values to a closed enum keeps cardinality bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyLabel {
    Unified,
    Sequential,
}

impl StrategyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unified => "unified",
            Self::Sequential => "sequential",
        }
    }
}

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    generations_total: IntCounterVec,
    generation_duration: HistogramVec,
    unified_fallbacks: IntCounter,
    cache_events: IntCounterVec,
    truncation_retries: IntCounterVec,
}

impl Metrics {
    /// Create a new collector with its own registry
    ///
    /// # Errors
    /// Returns an error if metric registration fails (e.g., duplicate
    /// names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let generations_total = IntCounterVec::new(
            Opts::new(
                "sketchmind_generations_total",
                "Generation requests by strategy and outcome",
            ),
            &["strategy", "outcome"],
        )?;

        let generation_duration = HistogramVec::new(
            HistogramOpts::new(
                "sketchmind_generation_duration_seconds",
                "End-to-end generation latency by strategy",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 45.0, 90.0]),
            &["strategy"],
        )?;

        let unified_fallbacks = IntCounter::new(
            "sketchmind_unified_fallbacks_total",
            "Unified attempts that fell back to the sequential strategy",
        )?;

        let cache_events = IntCounterVec::new(
            Opts::new("sketchmind_cache_events_total", "Content cache hits and misses"),
            &["event"],
        )?;

        let truncation_retries = IntCounterVec::new(
            Opts::new(
                "sketchmind_truncation_retries_total",
                "Executor retries triggered by the output-token ceiling",
            ),
            &["stage"],
        )?;

        registry.register(Box::new(generations_total.clone()))?;
        registry.register(Box::new(generation_duration.clone()))?;
        registry.register(Box::new(unified_fallbacks.clone()))?;
        registry.register(Box::new(cache_events.clone()))?;
        registry.register(Box::new(truncation_retries.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            generations_total,
            generation_duration,
            unified_fallbacks,
            cache_events,
            truncation_retries,
        })
    }

    pub fn record_generation(&self, strategy: StrategyLabel, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.generations_total
            .with_label_values(&[strategy.as_str(), outcome])
            .inc();
    }

    pub fn observe_duration(&self, strategy: StrategyLabel, seconds: f64) {
        self.generation_duration
            .with_label_values(&[strategy.as_str()])
            .observe(seconds);
    }

    pub fn record_fallback(&self) {
        self.unified_fallbacks.inc();
    }

    pub fn record_cache_hit(&self) {
        self.cache_events.with_label_values(&["hit"]).inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_events.with_label_values(&["miss"]).inc();
    }

    pub fn record_truncation_retry(&self, stage: &str) {
        self.truncation_retries.with_label_values(&[stage]).inc();
    }

    /// Render all metrics in Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
